// ==========================================
// 制造运营雷达 - 瓶颈识别引擎
// ==========================================
// 职责: 等待时间排名 / WIP 占比排名 / 资源利用率排名
// 输入: ProcessModel + WipReport + EventLog
// 排序: 严重度降序,并列按标准位置升序 (输入顺序无关)
// ==========================================

use crate::config::AnalysisConfig;
use crate::domain::bottleneck::{BottleneckRecord, ResourceUtilization, WipBottleneckRecord};
use crate::domain::event::{hours_between, EventLog};
use crate::domain::process::ProcessModel;
use crate::domain::types::Ratio;
use crate::domain::wip::WipReport;
use crate::engine::process_mining::mean;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, info};

// ==========================================
// BottleneckDetector - 瓶颈识别引擎
// ==========================================
pub struct BottleneckDetector {
    wait_threshold_multiplier: f64,
    wip_bottleneck_quantile: f64,
    utilization_threshold: f64,
}

impl BottleneckDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            wait_threshold_multiplier: config.wait_threshold_multiplier,
            wip_bottleneck_quantile: config.wip_bottleneck_quantile,
            utilization_threshold: config.utilization_threshold,
        }
    }

    /// 等待时间排名
    ///
    /// # 规则
    /// - pct_of_total_wait = 工序等待总和 / 全部等待总和 (百分比; 总和为 0 时 undefined)
    /// - wait_cycle_ratio = 平均等待 / 平均加工 (加工为 0 时 unbounded)
    /// - is_bottleneck: 平均等待 > 倍数 × 各工序平均加工时间的均值
    pub fn rank_by_wait(&self, model: &ProcessModel) -> Vec<BottleneckRecord> {
        let total_wait: f64 = model.operation_stats.iter().map(|s| s.total_wait_hours).sum();
        let cycle_means: Vec<f64> = model
            .operation_stats
            .iter()
            .map(|s| s.mean_cycle_hours)
            .collect();
        let threshold = self.wait_threshold_multiplier * mean(&cycle_means);

        let mut records: Vec<BottleneckRecord> = model
            .operation_stats
            .iter()
            .map(|stats| BottleneckRecord {
                rank: 0,
                operation: stats.operation.clone(),
                position: stats.position,
                mean_wait_time: stats.mean_wait_hours,
                mean_cycle_time: stats.mean_cycle_hours,
                wait_cycle_ratio: Ratio::severity(stats.mean_wait_hours, stats.mean_cycle_hours),
                pct_of_total_wait: Ratio::of(stats.total_wait_hours * 100.0, total_wait),
                is_bottleneck: stats.mean_wait_hours > threshold,
            })
            .collect();

        records.sort_by(|a, b| {
            b.pct_of_total_wait
                .cmp_severity(&a.pct_of_total_wait)
                .then_with(|| a.position.cmp(&b.position))
                .then_with(|| a.operation.cmp(&b.operation))
        });
        for (idx, record) in records.iter_mut().enumerate() {
            record.rank = idx + 1;
        }

        info!(
            operations = records.len(),
            flagged = records.iter().filter(|r| r.is_bottleneck).count(),
            wait_threshold_hours = threshold,
            top = records.first().map(|r| r.operation.as_str()).unwrap_or("-"),
            "等待瓶颈排名完成"
        );
        records
    }

    /// WIP 占比排名
    ///
    /// 占比超过各工序占比的给定分位数 (默认上四分位) 即判定为 WIP 瓶颈
    pub fn rank_by_wip(&self, wip: &WipReport) -> Vec<WipBottleneckRecord> {
        let total: f64 = wip
            .operation_stats
            .iter()
            .map(|s| s.wip_mean.defined_or(0.0))
            .sum();

        let mut records: Vec<WipBottleneckRecord> = wip
            .operation_stats
            .iter()
            .map(|stats| WipBottleneckRecord {
                rank: 0,
                operation: stats.operation.clone(),
                position: stats.position,
                wip_mean: stats.wip_mean,
                wip_max: stats.wip_max,
                share_of_total_wip: Ratio::of(stats.wip_mean.defined_or(0.0) * 100.0, total),
                is_bottleneck: false,
            })
            .collect();

        let shares: Vec<f64> = records
            .iter()
            .filter_map(|r| r.share_of_total_wip.value())
            .collect();
        if let Some(cutoff) = quantile(&shares, self.wip_bottleneck_quantile) {
            for record in records.iter_mut() {
                record.is_bottleneck = matches!(
                    record.share_of_total_wip.value(),
                    Some(share) if share > cutoff
                );
            }
            debug!(cutoff_pct = cutoff, "WIP 瓶颈分位阈值");
        }

        records.sort_by(|a, b| {
            b.share_of_total_wip
                .cmp_severity(&a.share_of_total_wip)
                .then_with(|| a.position.cmp(&b.position))
                .then_with(|| a.operation.cmp(&b.operation))
        });
        for (idx, record) in records.iter_mut().enumerate() {
            record.rank = idx + 1;
        }
        records
    }

    /// 资源利用率排名
    ///
    /// 忙碌时长为资源上事件区间的并集,分母为全局观察期
    pub fn resource_utilization(&self, log: &EventLog) -> Vec<ResourceUtilization> {
        let mut intervals: BTreeMap<&str, Vec<(NaiveDateTime, NaiveDateTime)>> = BTreeMap::new();
        for event in log.events() {
            intervals
                .entry(event.resource_id.as_str())
                .or_default()
                .push((event.start_time, event.end_time));
        }

        let horizon = log.horizon_hours();
        let mut records: Vec<ResourceUtilization> = intervals
            .into_iter()
            .map(|(resource_id, spans)| {
                let event_count = spans.len();
                let busy_hours = union_hours(spans);
                let utilization = Ratio::of(busy_hours, horizon);
                ResourceUtilization {
                    resource_id: resource_id.to_string(),
                    busy_hours,
                    event_count,
                    utilization,
                    is_bottleneck: matches!(
                        utilization.value(),
                        Some(u) if u > self.utilization_threshold
                    ),
                }
            })
            .collect();

        records.sort_by(|a, b| {
            b.utilization
                .cmp_severity(&a.utilization)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });

        debug!(
            resources = records.len(),
            flagged = records.iter().filter(|r| r.is_bottleneck).count(),
            "资源利用率计算完成"
        );
        records
    }
}

/// 区间并集时长 (小时)
fn union_hours(mut spans: Vec<(NaiveDateTime, NaiveDateTime)>) -> f64 {
    spans.sort();
    let mut total = 0.0;
    let mut current: Option<(NaiveDateTime, NaiveDateTime)> = None;
    for (start, end) in spans {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                total += hours_between(cs, ce);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        total += hours_between(cs, ce);
    }
    total
}

/// 线性插值分位数 (空集为 None)
pub(crate) fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::test_events::*;
    use crate::domain::wip::{FlowEfficiency, LittleLawCheck, OperationWipStats, WipSeries};
    use crate::domain::types::WipScope;
    use crate::engine::process_mining::ProcessMiningEngine;

    fn detector() -> BottleneckDetector {
        BottleneckDetector::new(&AnalysisConfig::default())
    }

    fn model(events: Vec<crate::domain::event::Event>) -> ProcessModel {
        let log = EventLog::from_events(events).unwrap();
        ProcessMiningEngine::new().analyze(&log)
    }

    #[test]
    fn test_rank_by_wait() {
        // B 前等待 4h 与 6h,C 前等待 0h 与 1h
        let model = model(vec![
            ev("P1", "A", 1, 1, 0.0, 1.0),
            ev("P1", "B", 2, 2, 5.0, 6.0),
            ev("P1", "C", 3, 3, 6.0, 7.0),
            ev("P2", "A", 1, 1, 0.0, 1.0),
            ev("P2", "B", 2, 2, 7.0, 8.0),
            ev("P2", "C", 3, 3, 9.0, 10.0),
        ]);
        let records = detector().rank_by_wait(&model);

        assert_eq!(records[0].operation, "B");
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].mean_wait_time, 5.0);
        assert_eq!(records[0].wait_cycle_ratio, Ratio::Defined(5.0));
        assert!(records[0].is_bottleneck);

        let c = &records[1];
        assert_eq!(c.operation, "C");
        assert!(!c.is_bottleneck);
        assert!((c.pct_of_total_wait.value().unwrap() - 100.0 / 11.0).abs() < 1e-9);

        // A 无等待,排最后
        assert_eq!(records[2].operation, "A");
        assert_eq!(records[2].pct_of_total_wait, Ratio::Defined(0.0));
    }

    #[test]
    fn test_zero_cycle_time_is_unbounded() {
        let model = model(vec![ev("P1", "A", 1, 1, 0.0, 0.0)]);
        let records = detector().rank_by_wait(&model);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].wait_cycle_ratio, Ratio::Unbounded);
        assert_eq!(records[0].pct_of_total_wait, Ratio::Undefined);
        assert!(!records[0].is_bottleneck);
    }

    #[test]
    fn test_ties_broken_by_position() {
        let model = model(vec![
            ev("P1", "B", 2, 2, 3.0, 4.0),
            ev("P1", "A", 1, 1, 0.0, 1.0),
            ev("P1", "C", 3, 3, 6.0, 7.0),
        ]);
        let records = detector().rank_by_wait(&model);
        let order: Vec<&str> = records.iter().map(|r| r.operation.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    fn wip_report(means: &[(&str, u32, f64)]) -> WipReport {
        let series = WipSeries {
            scope: WipScope::Global,
            records: vec![],
            wip_mean: Ratio::Defined(1.0),
            wip_max: 1,
        };
        WipReport {
            global: series,
            by_operation: vec![],
            operation_stats: means
                .iter()
                .map(|(op, pos, m)| OperationWipStats {
                    operation: op.to_string(),
                    position: *pos,
                    wip_mean: Ratio::Defined(*m),
                    wip_max: 1,
                    event_count: 1,
                })
                .collect(),
            accumulation_points: vec![],
            flow_efficiency: FlowEfficiency {
                total_value_add_hours: 0.0,
                total_lead_time_hours: 0.0,
                flow_efficiency: Ratio::Undefined,
                mean_value_add_hours: 0.0,
                mean_waste_hours: 0.0,
            },
            little_law: LittleLawCheck {
                wip_mean: Ratio::Undefined,
                throughput_per_hour: Ratio::Undefined,
                lead_time_mean_hours: 0.0,
                expected_wip: Ratio::Undefined,
                relative_deviation: Ratio::Undefined,
                tolerance: 0.1,
                within_tolerance: true,
            },
        }
    }

    #[test]
    fn test_rank_by_wip_top_quartile() {
        let report = wip_report(&[("A", 1, 0.5), ("B", 2, 4.0), ("C", 3, 1.0), ("D", 4, 2.5)]);
        let records = detector().rank_by_wip(&report);

        assert_eq!(records[0].operation, "B");
        assert_eq!(records[0].share_of_total_wip, Ratio::Defined(50.0));
        assert!(records[0].is_bottleneck);
        assert!(records[1..].iter().all(|r| !r.is_bottleneck));
    }

    #[test]
    fn test_resource_utilization_merges_overlaps() {
        let log = EventLog::from_events(vec![
            ev("P1", "A", 1, 1, 0.0, 4.0),
            ev("P2", "A", 1, 1, 2.0, 6.0),
            ev("P2", "B", 2, 2, 9.0, 10.0),
        ])
        .unwrap();
        let records = detector().resource_utilization(&log);

        assert_eq!(records[0].resource_id, "R-A");
        assert_eq!(records[0].busy_hours, 6.0);
        assert_eq!(records[0].utilization, Ratio::Defined(0.6));
        assert!(!records[0].is_bottleneck);
        assert_eq!(records[1].busy_hours, 1.0);
    }

    #[test]
    fn test_quantile() {
        assert_eq!(quantile(&[], 0.75), None);
        assert_eq!(quantile(&[3.0], 0.75), Some(3.0));
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.75), Some(4.0));
    }
}
