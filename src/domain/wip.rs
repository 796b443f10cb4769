// ==========================================
// 制造运营雷达 - WIP 记录
// ==========================================
// 职责: WIP 时间序列 / 工序 WIP 统计 / 堆积点 / 流动效率 / 利特尔法则校验
// ==========================================

use crate::domain::serde_fmt::pct1;
use crate::domain::types::{Ratio, WipScope};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// WIP 采样点 (在每个事件边界采样,而非固定时钟)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipRecord {
    pub scope: WipScope,
    pub timestamp: NaiveDateTime,
    pub concurrent_count: u32,
}

/// WIP 时间序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipSeries {
    pub scope: WipScope,
    pub records: Vec<WipRecord>,
    /// 在全局观察期上的时间加权平均
    pub wip_mean: Ratio,
    pub wip_max: u32,
}

/// 工序 WIP 统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationWipStats {
    pub operation: String,
    pub position: u32,
    pub wip_mean: Ratio,
    pub wip_max: u32,
    pub event_count: usize,
}

/// WIP 堆积点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipAccumulationPoint {
    pub operation: String,
    pub wip_mean: f64,
    /// 超出工序平均 WIP 的件数
    pub wip_excess: f64,
    #[serde(with = "pct1")]
    pub wip_excess_pct: f64,
}

/// 流动效率
///
/// 增值时间 = status == normal 的事件时长之和,返工时间不计入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEfficiency {
    pub total_value_add_hours: f64,
    pub total_lead_time_hours: f64,
    pub flow_efficiency: Ratio,
    pub mean_value_add_hours: f64,
    pub mean_waste_hours: f64,
}

/// 利特尔法则一致性诊断 (不是硬失败)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LittleLawCheck {
    pub wip_mean: Ratio,
    pub throughput_per_hour: Ratio,
    pub lead_time_mean_hours: f64,
    /// throughput × lead_time_mean
    pub expected_wip: Ratio,
    /// |wip_mean - expected_wip| / wip_mean
    pub relative_deviation: Ratio,
    pub tolerance: f64,
    pub within_tolerance: bool,
}

/// WIP 分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipReport {
    pub global: WipSeries,
    /// 按标准位置升序
    pub by_operation: Vec<WipSeries>,
    pub operation_stats: Vec<OperationWipStats>,
    pub accumulation_points: Vec<WipAccumulationPoint>,
    pub flow_efficiency: FlowEfficiency,
    pub little_law: LittleLawCheck,
}

impl WipReport {
    pub fn stats_for(&self, operation: &str) -> Option<&OperationWipStats> {
        self.operation_stats.iter().find(|s| s.operation == operation)
    }
}
