// ==========================================
// 制造运营雷达 - 瓶颈记录
// ==========================================
// 职责: 等待时间排名 / WIP 排名 / 资源利用率排名
// ==========================================

use crate::domain::serde_fmt::ratio_pct1;
use crate::domain::types::Ratio;
use serde::{Deserialize, Serialize};

/// 等待时间瓶颈记录
///
/// 时间单位为小时。`wait_cycle_ratio` 在平均加工时间为 0 时为 Unbounded,
/// 表示严重度无上限而非错误。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckRecord {
    pub rank: usize,
    pub operation: String,
    pub position: u32,
    pub mean_wait_time: f64,
    pub mean_cycle_time: f64,
    pub wait_cycle_ratio: Ratio,
    /// 工序等待时间占总等待时间的百分比
    #[serde(with = "ratio_pct1")]
    pub pct_of_total_wait: Ratio,
    pub is_bottleneck: bool,
}

/// WIP 瓶颈记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipBottleneckRecord {
    pub rank: usize,
    pub operation: String,
    pub position: u32,
    pub wip_mean: Ratio,
    pub wip_max: u32,
    /// 工序 WIP 占各工序 WIP 之和的百分比
    #[serde(with = "ratio_pct1")]
    pub share_of_total_wip: Ratio,
    pub is_bottleneck: bool,
}

/// 资源利用率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub resource_id: String,
    pub busy_hours: f64,
    pub event_count: usize,
    /// busy_hours / 观察期 (0~1,重叠加工时可超过 1)
    pub utilization: Ratio,
    pub is_bottleneck: bool,
}
