// ==========================================
// 制造运营雷达 - 领域层
// ==========================================
// 职责: 事件日志实体与各分析器的类型化结果记录
// 红线: 领域对象构造后不可变,每次分析新建
// ==========================================

pub mod bottleneck;
pub mod bundle;
pub mod event;
pub mod process;
pub mod recommendation;
pub mod rework;
pub mod serde_fmt;
pub mod types;
pub mod wip;

// 重导出核心类型
pub use bottleneck::{BottleneckRecord, ResourceUtilization, WipBottleneckRecord};
pub use bundle::{DataQualityWarning, Diagnostics, KpiSummary, ResultBundle};
pub use event::{CanonicalFlow, Event, EventLog, Operation, Trace};
pub use process::{
    GraphEdge, OperationStats, PieceLeadTime, ProcessGraph, ProcessModel, ProcessOverview,
    ProcessVariant,
};
pub use recommendation::{ImpactSummary, RecommendationRecord};
pub use rework::{DefectCause, LeadTimeImpact, ReworkCost, ReworkPattern, ReworkRecord, ReworkReport};
pub use types::{ActionType, EventStatus, PriorityTier, Ratio, WipScope};
pub use wip::{
    FlowEfficiency, LittleLawCheck, OperationWipStats, WipAccumulationPoint, WipRecord, WipReport,
    WipSeries,
};
