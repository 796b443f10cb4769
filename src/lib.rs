// ==========================================
// 制造运营雷达 - 核心库
// ==========================================
// 输入: 生产事件日志 (MES 导出)
// 输出: 诊断集合与按优先级排序的改进建议
// 系统定位: 决策支持 (建议由人工评审后执行)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 事件日志与结果记录
pub mod domain;

// 引擎层 - 分析规则
pub mod engine;

// 错误分类
pub mod error;

// 导入层 - 事件日志读取
pub mod importer;

// 配置层 - 阈值与成本模型
pub mod config;

// 数据仓储层 - 分析结果持久化
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    ActionType, CanonicalFlow, Diagnostics, Event, EventLog, EventStatus, KpiSummary, Operation,
    PriorityTier, Ratio, ResultBundle,
};

pub use engine::{
    AnalysisOrchestrator, BottleneckDetector, OptimizationEngine, ProcessMiningEngine,
    ReworkTracker, WipAnalyzer,
};

pub use config::{AnalysisConfig, ConfigManager, CostModel, OptimizationConfig};
pub use error::{AnalysisError, AnalysisResult, ConfigurationError, DataIntegrityError};
pub use importer::CsvEventLogReader;
pub use repository::AnalysisRunRepository;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "制造运营雷达";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
