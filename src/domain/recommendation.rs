// ==========================================
// 制造运营雷达 - 改进建议与综合影响
// ==========================================
// 百分比字段: 带符号,负值表示改善
// ==========================================

use crate::domain::serde_fmt::pct1;
use crate::domain::types::{ActionType, PriorityTier, Ratio};
use serde::{Deserialize, Serialize};

/// 改进建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub rank: usize,
    pub action_type: ActionType,
    /// 目标工序
    pub target: String,
    pub priority: PriorityTier,
    pub priority_score: f64,
    /// 驱动因子: 资源类为等待占比,质量类为返工率 (0~1)
    pub driver: Ratio,
    pub cost: f64,
    #[serde(with = "pct1")]
    pub delta_wip_pct: f64,
    #[serde(with = "pct1")]
    pub delta_leadtime_pct: f64,
    pub monthly_savings: f64,
    pub roi: Ratio,
    /// 月节约为 0 时为 Undefined
    pub payback_months: Ratio,
    /// 折现节约 - 成本
    pub npv: f64,
    pub rationale: String,
}

/// 综合影响 (按递减收益复合,不是简单相加)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub action_count: usize,
    #[serde(with = "pct1")]
    pub delta_wip_pct: f64,
    #[serde(with = "pct1")]
    pub delta_leadtime_pct: f64,
    /// 各动作独立增量的直接相加,仅供对照
    #[serde(with = "pct1")]
    pub naive_delta_wip_pct: f64,
    #[serde(with = "pct1")]
    pub naive_delta_leadtime_pct: f64,
    pub total_cost: f64,
    pub blended_roi: Ratio,
    pub baseline_wip_mean: Ratio,
    pub projected_wip_mean: Ratio,
    pub baseline_lead_time_hours: f64,
    pub projected_lead_time_hours: f64,
}
