// ==========================================
// 制造运营雷达 - 返工追踪引擎
// ==========================================
// 职责: 返工识别 / 工序返工率与一次合格率 / 交付周期影响
//       返工成本 / 返工模式 / 缺陷原因
// 返工判定: status == rework,或工序标准位置 <= 此前已到达的最大位置
// 红线: 无访问的工序返工率为 undefined,不计 0
// ==========================================

use crate::domain::event::{EventLog, Trace};
use crate::domain::process::ProcessModel;
use crate::domain::rework::{
    DefectCause, LeadTimeImpact, ReworkCost, ReworkPattern, ReworkRecord, ReworkReport,
};
use crate::domain::types::Ratio;
use crate::engine::process_mining::mean;
use std::collections::BTreeMap;
use tracing::info;

// 单工序累加器
#[derive(Default)]
struct ReworkAccumulator {
    visits: usize,
    rework_count: usize,
    rework_hours: f64,
    rework_cost: f64,
}

// ==========================================
// ReworkTracker - 返工追踪引擎
// ==========================================
pub struct ReworkTracker {
    // 无状态引擎
}

impl ReworkTracker {
    pub fn new() -> Self {
        Self {}
    }

    /// 轨迹内每个事件是否为返工实例
    pub fn rework_instances(&self, log: &EventLog, trace: &Trace) -> Vec<bool> {
        let mut max_position: Option<u32> = None;
        trace
            .events
            .iter()
            .map(|event| {
                let position = log
                    .flow()
                    .position_of(&event.operation_name)
                    .unwrap_or(event.operation_sequence);
                let loop_back = max_position.map_or(false, |max| position <= max);
                max_position = Some(max_position.map_or(position, |max| max.max(position)));
                event.status.is_rework() || loop_back
            })
            .collect()
    }

    /// 完整返工分析
    pub fn analyze(&self, log: &EventLog, model: &ProcessModel) -> ReworkReport {
        let mut acc: BTreeMap<&str, ReworkAccumulator> = BTreeMap::new();
        let mut patterns: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut causes: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut lead_with = Vec::new();
        let mut lead_without = Vec::new();
        let mut total_rework_instances = 0;

        for trace in log.traces() {
            let flags = self.rework_instances(log, trace);
            let mut piece_has_rework = false;

            for (idx, (event, is_rework)) in trace.events.iter().zip(&flags).enumerate() {
                let entry = acc.entry(event.operation_name.as_str()).or_default();
                entry.visits += 1;
                if !*is_rework {
                    continue;
                }

                piece_has_rework = true;
                total_rework_instances += 1;
                entry.rework_count += 1;
                entry.rework_hours += event.duration_hours();
                entry.rework_cost += event.cost;

                if let Some(previous) = idx.checked_sub(1).map(|i| &trace.events[i]) {
                    *patterns
                        .entry((previous.operation_name.clone(), event.operation_name.clone()))
                        .or_insert(0) += 1;
                }
                if let Some(code) = &event.defect_code {
                    *causes
                        .entry((code.clone(), event.operation_name.clone()))
                        .or_insert(0) += 1;
                }
            }

            if piece_has_rework {
                lead_with.push(trace.lead_time_hours());
            } else {
                lead_without.push(trace.lead_time_hours());
            }
        }

        let records = self.records(log, &acc);
        let costs = Self::costs(&acc);
        let lead_time_impact = self.lead_time_impact(&lead_with, &lead_without);
        let global_rework_rate = Ratio::of(total_rework_instances as f64, log.event_count() as f64);

        let mut patterns: Vec<ReworkPattern> = patterns
            .into_iter()
            .map(|((from_operation, to_operation), count)| ReworkPattern {
                from_operation,
                to_operation,
                count,
            })
            .collect();
        patterns.sort_by(|a, b| b.count.cmp(&a.count));

        let mut defect_causes: Vec<DefectCause> = causes
            .into_iter()
            .map(|((defect_code, operation), count)| DefectCause {
                defect_code,
                operation,
                count,
            })
            .collect();
        defect_causes.sort_by(|a, b| b.count.cmp(&a.count));

        info!(
            rework_instances = total_rework_instances,
            global_rework_rate = %global_rework_rate,
            pieces_with_rework = lead_time_impact.pieces_with_rework,
            lead_time_increase_pct = %lead_time_impact.lead_time_increase_pct,
            "返工分析完成"
        );

        ReworkReport {
            records,
            total_rework_instances,
            global_rework_rate,
            lead_time_impact,
            costs,
            patterns,
            defect_causes,
            loop_edges: model.graph.rework_edges(log.flow()),
        }
    }

    /// 工序返工记录 (覆盖标准流程中的全部工序)
    fn records(&self, log: &EventLog, acc: &BTreeMap<&str, ReworkAccumulator>) -> Vec<ReworkRecord> {
        log.flow()
            .operations()
            .iter()
            .map(|op| {
                let (rework_count, total_count) = acc
                    .get(op.name.as_str())
                    .map_or((0, 0), |a| (a.rework_count, a.visits));
                let rate = Ratio::of(rework_count as f64, total_count as f64);
                ReworkRecord {
                    operation: op.name.clone(),
                    position: op.position,
                    rework_count,
                    total_count,
                    rate,
                    first_pass_yield: rate.map(|r| 1.0 - r),
                }
            })
            .collect()
    }

    /// 返工成本 (仅有返工的工序,按成本降序)
    fn costs(acc: &BTreeMap<&str, ReworkAccumulator>) -> Vec<ReworkCost> {
        let mut costs: Vec<ReworkCost> = acc
            .iter()
            .filter(|(_, a)| a.rework_count > 0)
            .map(|(op, a)| ReworkCost {
                operation: op.to_string(),
                rework_count: a.rework_count,
                rework_hours: a.rework_hours,
                rework_cost: a.rework_cost,
            })
            .collect();
        costs.sort_by(|a, b| {
            b.rework_cost
                .total_cmp(&a.rework_cost)
                .then_with(|| a.operation.cmp(&b.operation))
        });
        costs
    }

    /// 含返工工件与无返工工件的平均交付周期对比
    pub fn lead_time_impact(&self, with_rework: &[f64], without_rework: &[f64]) -> LeadTimeImpact {
        let mean_or_undefined = |values: &[f64]| {
            if values.is_empty() {
                Ratio::Undefined
            } else {
                Ratio::Defined(mean(values))
            }
        };
        let mean_with = mean_or_undefined(with_rework);
        let mean_without = mean_or_undefined(without_rework);

        let lead_time_increase_pct = match (mean_with, mean_without) {
            (Ratio::Defined(w), Ratio::Defined(wo)) if w == wo => Ratio::Defined(0.0),
            (Ratio::Defined(w), Ratio::Defined(wo)) => Ratio::severity((w - wo) * 100.0, wo),
            _ => Ratio::Undefined,
        };

        let pieces = with_rework.len() + without_rework.len();
        LeadTimeImpact {
            pieces_with_rework: with_rework.len(),
            pieces_without_rework: without_rework.len(),
            mean_lead_time_with_rework: mean_with,
            mean_lead_time_without_rework: mean_without,
            lead_time_increase_pct,
            pieces_with_rework_share: Ratio::of(with_rework.len() as f64, pieces as f64),
        }
    }
}

impl Default for ReworkTracker {
    fn default() -> Self {
        Self::new()
    }
}
