// ==========================================
// 制造运营雷达 - 引擎层
// ==========================================
// 职责: 流程挖掘 / 瓶颈识别 / WIP 分析 / 返工追踪 / 优化建议 / 编排
// 红线: 引擎不访问数据库,输入为不可变事件日志,输出为新建的结果记录
// ==========================================

pub mod bottleneck;
pub mod optimization;
pub mod orchestrator;
pub mod process_mining;
pub mod rework;
pub mod wip;

// 重导出核心引擎
pub use bottleneck::BottleneckDetector;
pub use optimization::{OptimizationEngine, OptimizationInput, OptimizationOutcome};
pub use orchestrator::AnalysisOrchestrator;
pub use process_mining::ProcessMiningEngine;
pub use rework::ReworkTracker;
pub use wip::WipAnalyzer;
