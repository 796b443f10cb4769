// ==========================================
// 制造运营雷达 - 返工记录
// ==========================================
// 职责: 工序返工率 / 交付周期影响 / 返工成本 / 返工模式 / 缺陷原因
// 红线: 零访问工序的返工率为 Undefined,不是 0
// ==========================================

use crate::domain::process::GraphEdge;
use crate::domain::serde_fmt::ratio_pct1;
use crate::domain::types::Ratio;
use serde::{Deserialize, Serialize};

/// 工序返工记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReworkRecord {
    pub operation: String,
    pub position: u32,
    pub rework_count: usize,
    pub total_count: usize,
    /// rework_count / total_count ∈ [0,1]
    pub rate: Ratio,
    /// 1 - rate
    pub first_pass_yield: Ratio,
}

/// 返工对交付周期的影响
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeImpact {
    pub pieces_with_rework: usize,
    pub pieces_without_rework: usize,
    pub mean_lead_time_with_rework: Ratio,
    pub mean_lead_time_without_rework: Ratio,
    /// 含返工工件相对无返工工件的交付周期增幅 (%)
    #[serde(with = "ratio_pct1")]
    pub lead_time_increase_pct: Ratio,
    pub pieces_with_rework_share: Ratio,
}

/// 返工成本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReworkCost {
    pub operation: String,
    pub rework_count: usize,
    pub rework_hours: f64,
    pub rework_cost: f64,
}

/// 返工模式: 前序工序 → 返工工序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReworkPattern {
    pub from_operation: String,
    pub to_operation: String,
    pub count: usize,
}

/// 缺陷原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectCause {
    pub defect_code: String,
    pub operation: String,
    pub count: usize,
}

/// 返工分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReworkReport {
    /// 覆盖标准流程中的全部工序,按标准位置升序
    pub records: Vec<ReworkRecord>,
    pub total_rework_instances: usize,
    pub global_rework_rate: Ratio,
    pub lead_time_impact: LeadTimeImpact,
    pub costs: Vec<ReworkCost>,
    pub patterns: Vec<ReworkPattern>,
    pub defect_causes: Vec<DefectCause>,
    pub loop_edges: Vec<GraphEdge>,
}

impl ReworkReport {
    pub fn record_for(&self, operation: &str) -> Option<&ReworkRecord> {
        self.records.iter().find(|r| r.operation == operation)
    }
}
