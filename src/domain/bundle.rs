// ==========================================
// 制造运营雷达 - 分析结果包
// ==========================================
// 职责: KPI 摘要 / 诊断集合 / 结果包 (报表层输入契约)
// 红线: 结果包不含运行时间戳等易变字段,同一快照重复运行字节一致
// ==========================================

use crate::domain::bottleneck::{BottleneckRecord, ResourceUtilization, WipBottleneckRecord};
use crate::domain::process::ProcessModel;
use crate::domain::recommendation::{ImpactSummary, RecommendationRecord};
use crate::domain::rework::ReworkReport;
use crate::domain::types::Ratio;
use crate::domain::wip::WipReport;
use serde::{Deserialize, Serialize};

/// KPI 摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub lead_time_mean_hours: f64,
    pub wip_mean: Ratio,
    pub throughput_per_day: Ratio,
    pub rework_rate_global: Ratio,
    pub flow_efficiency: Ratio,
}

/// 数据质量告警 (诊断性,不中断分析)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub code: String,
    pub message: String,
}

impl DataQualityWarning {
    pub fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
        }
    }
}

/// 诊断集合 (无需成本模型即可产出)
///
/// 可视化层消费其中的流程图、WIP 序列与返工记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub log_version: String,
    pub kpis: KpiSummary,
    pub process: ProcessModel,
    pub bottlenecks: Vec<BottleneckRecord>,
    pub wip_bottlenecks: Vec<WipBottleneckRecord>,
    pub resource_utilization: Vec<ResourceUtilization>,
    pub wip: WipReport,
    pub rework: ReworkReport,
    pub warnings: Vec<DataQualityWarning>,
}

/// 结果包 (报表/序列化层输入)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub log_version: String,
    pub kpis: KpiSummary,
    pub bottlenecks: Vec<BottleneckRecord>,
    pub recommendations: Vec<RecommendationRecord>,
    pub impact: ImpactSummary,
    pub warnings: Vec<DataQualityWarning>,
}

impl ResultBundle {
    /// 规范 JSON 输出
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
