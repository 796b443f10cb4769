// ==========================================
// 制造运营雷达 - 流程挖掘引擎
// ==========================================
// 职责: 流程图构建 / 交付周期 / 工序加工与等待统计 / 路径变体
// 输入: 已校验的 EventLog
// 输出: ProcessModel (其余分析器只读消费)
// 红线: 纯函数,同一快照重复调用结果一致
// ==========================================

use crate::domain::event::{EventLog, Trace};
use crate::domain::process::{
    OperationStats, PieceLeadTime, ProcessGraph, ProcessModel, ProcessOverview, ProcessVariant,
};
use crate::domain::types::{EventStatus, Ratio};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 路径变体文本的分隔符
pub const VARIANT_SEPARATOR: &str = " → ";

// 单工序累加器
#[derive(Default)]
struct OperationAccumulator {
    durations: Vec<f64>,
    normal_count: usize,
    rework_count: usize,
    total_wait: f64,
}

// ==========================================
// ProcessMiningEngine - 流程挖掘引擎
// ==========================================
pub struct ProcessMiningEngine {
    // 无状态引擎
}

impl ProcessMiningEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 完整流程挖掘
    pub fn analyze(&self, log: &EventLog) -> ProcessModel {
        let graph = self.build_process_graph(log);
        let operation_stats = self.operation_stats(log);
        let lead_times = self.lead_times(log);
        let variants = self.variants(log);
        let overview = self.overview(log, &lead_times, operation_stats.len());

        info!(
            log_version = %log.version_id(),
            pieces = overview.piece_count,
            operations = overview.operation_count,
            transitions = graph.total_transitions(),
            variants = variants.len(),
            lead_time_mean_hours = overview.lead_time_mean_hours,
            "流程挖掘完成"
        );

        ProcessModel {
            log_version: log.version_id().to_string(),
            graph,
            operation_stats,
            lead_times,
            variants,
            overview,
        }
    }

    // ==========================================
    // 流程图
    // ==========================================

    /// 扫描每条轨迹的相邻事件对,累加转移次数
    pub fn build_process_graph(&self, log: &EventLog) -> ProcessGraph {
        let mut graph = ProcessGraph::new();
        for trace in log.traces() {
            for event in &trace.events {
                graph.add_node(&event.operation_name);
            }
            for pair in trace.events.windows(2) {
                graph.record_transition(&pair[0].operation_name, &pair[1].operation_name);
            }
        }
        debug!(
            nodes = graph.node_count(),
            transitions = graph.total_transitions(),
            "流程图构建完成"
        );
        graph
    }

    // ==========================================
    // 交付周期
    // ==========================================

    /// 单工件交付周期 (小时)
    pub fn lead_time(&self, trace: &Trace) -> f64 {
        trace.lead_time_hours()
    }

    /// 全部工件交付周期 (按 piece_id 升序)
    pub fn lead_times(&self, log: &EventLog) -> Vec<PieceLeadTime> {
        log.traces()
            .iter()
            .map(|trace| PieceLeadTime {
                piece_id: trace.piece_id.clone(),
                lead_time_hours: self.lead_time(trace),
                event_count: trace.events.len(),
            })
            .collect()
    }

    /// 平均交付周期 (小时)
    pub fn lead_time_mean(&self, log: &EventLog) -> f64 {
        let values: Vec<f64> = log.traces().iter().map(|t| self.lead_time(t)).collect();
        mean(&values)
    }

    // ==========================================
    // 加工时间 / 工序统计
    // ==========================================

    /// 工序平均加工时间 (小时)
    ///
    /// # 参数
    /// - status: None 表示正常与返工合并统计
    ///
    /// # 返回
    /// - None: 该工序无匹配事件
    pub fn cycle_time(
        &self,
        log: &EventLog,
        operation: &str,
        status: Option<EventStatus>,
    ) -> Option<f64> {
        let durations: Vec<f64> = log
            .events()
            .filter(|e| e.operation_name == operation)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .map(|e| e.duration_hours())
            .collect();

        if durations.is_empty() {
            None
        } else {
            Some(mean(&durations))
        }
    }

    /// 工序聚合统计 (仅观察到的工序,按标准位置升序)
    pub fn operation_stats(&self, log: &EventLog) -> Vec<OperationStats> {
        let mut acc: BTreeMap<&str, OperationAccumulator> = BTreeMap::new();

        for trace in log.traces() {
            let waits = trace.wait_times_hours();
            for (event, wait) in trace.events.iter().zip(waits) {
                let entry = acc.entry(event.operation_name.as_str()).or_default();
                entry.durations.push(event.duration_hours());
                entry.total_wait += wait;
                match event.status {
                    EventStatus::Normal => entry.normal_count += 1,
                    EventStatus::Rework => entry.rework_count += 1,
                }
            }
        }

        log.flow()
            .operations()
            .iter()
            .filter_map(|op| {
                let a = acc.get(op.name.as_str())?;
                let visits = a.durations.len();
                let total_cycle: f64 = a.durations.iter().sum();
                Some(OperationStats {
                    operation: op.name.clone(),
                    position: op.position,
                    visit_count: visits,
                    normal_count: a.normal_count,
                    rework_count: a.rework_count,
                    mean_cycle_hours: mean(&a.durations),
                    cycle_variance: variance(&a.durations),
                    min_cycle_hours: a.durations.iter().copied().fold(f64::INFINITY, f64::min),
                    max_cycle_hours: a.durations.iter().copied().fold(0.0, f64::max),
                    total_cycle_hours: total_cycle,
                    mean_wait_hours: a.total_wait / visits as f64,
                    total_wait_hours: a.total_wait,
                })
            })
            .collect()
    }

    // ==========================================
    // 路径变体 / 概览
    // ==========================================

    /// 路径变体 (按工件数降序,文本升序)
    pub fn variants(&self, log: &EventLog) -> Vec<ProcessVariant> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for trace in log.traces() {
            let text = trace
                .events
                .iter()
                .map(|e| e.operation_name.as_str())
                .collect::<Vec<_>>()
                .join(VARIANT_SEPARATOR);
            *counts.entry(text).or_insert(0) += 1;
        }

        let total = log.piece_count() as f64;
        let mut variants: Vec<ProcessVariant> = counts
            .into_iter()
            .map(|(trace, piece_count)| ProcessVariant {
                trace,
                piece_count,
                frequency: piece_count as f64 / total,
            })
            .collect();
        variants.sort_by(|a, b| {
            b.piece_count
                .cmp(&a.piece_count)
                .then_with(|| a.trace.cmp(&b.trace))
        });
        variants
    }

    fn overview(
        &self,
        log: &EventLog,
        lead_times: &[PieceLeadTime],
        operation_count: usize,
    ) -> ProcessOverview {
        let values: Vec<f64> = lead_times.iter().map(|l| l.lead_time_hours).collect();
        let horizon_hours = log.horizon_hours();
        let throughput_per_hour = Ratio::of(log.piece_count() as f64, horizon_hours);
        let rework_events = log.events().filter(|e| e.status.is_rework()).count();

        ProcessOverview {
            piece_count: log.piece_count(),
            operation_count,
            event_count: log.event_count(),
            lead_time_mean_hours: mean(&values),
            lead_time_std_hours: variance(&values).sqrt(),
            lead_time_min_hours: values.iter().copied().fold(f64::INFINITY, f64::min),
            lead_time_max_hours: values.iter().copied().fold(0.0, f64::max),
            horizon_hours,
            throughput_per_hour,
            throughput_per_day: throughput_per_hour.map(|v| v * 24.0),
            rework_status_share: rework_events as f64 / log.event_count() as f64,
        }
    }
}

impl Default for ProcessMiningEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 统计辅助函数
// ==========================================

/// 算术平均 (空集为 0)
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// 总体方差 (空集为 0)
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::test_events::*;

    fn sample_log() -> EventLog {
        // P1: A(0-1) B(3-5) A(6-7 返工) B(7-8)
        // P2: A(1-2) B(2-3)
        EventLog::from_events(vec![
            ev("P1", "A", 1, 1, 0.0, 1.0),
            ev("P1", "B", 2, 2, 3.0, 5.0),
            rework("P1", "A", 1, 3, 6.0, 7.0, Some(1)),
            ev("P1", "B", 2, 4, 7.0, 8.0),
            ev("P2", "A", 1, 1, 1.0, 2.0),
            ev("P2", "B", 2, 2, 2.0, 3.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_process_graph() {
        let engine = ProcessMiningEngine::new();
        let graph = engine.build_process_graph(&sample_log());

        assert_eq!(graph.transition_count("A", "B"), 3);
        assert_eq!(graph.transition_count("B", "A"), 1);
        assert_eq!(graph.total_transitions(), 4);

        let loops = graph.rework_edges(sample_log().flow());
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].from_operation, "B");
    }

    #[test]
    fn test_lead_times() {
        let engine = ProcessMiningEngine::new();
        let log = sample_log();
        let lead_times = engine.lead_times(&log);

        assert_eq!(lead_times[0].piece_id, "P1");
        assert_eq!(lead_times[0].lead_time_hours, 8.0);
        assert_eq!(lead_times[1].lead_time_hours, 2.0);
        assert_eq!(engine.lead_time_mean(&log), 5.0);
    }

    #[test]
    fn test_cycle_time_with_status_filter() {
        let engine = ProcessMiningEngine::new();
        let log = sample_log();

        assert_eq!(engine.cycle_time(&log, "A", None), Some(1.0));
        assert_eq!(engine.cycle_time(&log, "B", None), Some(4.0 / 3.0));
        assert_eq!(engine.cycle_time(&log, "A", Some(EventStatus::Rework)), Some(1.0));
        assert_eq!(engine.cycle_time(&log, "B", Some(EventStatus::Rework)), None);
        assert_eq!(engine.cycle_time(&log, "Z", None), None);
    }

    #[test]
    fn test_operation_stats() {
        let engine = ProcessMiningEngine::new();
        let stats = engine.operation_stats(&sample_log());

        assert_eq!(stats.len(), 2);
        let a = &stats[0];
        assert_eq!(a.operation, "A");
        assert_eq!(a.visit_count, 3);
        assert_eq!(a.rework_count, 1);
        assert_eq!(a.normal_count, 2);
        // 等待: P1 首事件 0, 返工 A 前 1h, P2 首事件 0
        assert_eq!(a.total_wait_hours, 1.0);

        let b = &stats[1];
        // 等待: P1 2h + 0h, P2 0h
        assert_eq!(b.total_wait_hours, 2.0);
        assert_eq!(b.min_cycle_hours, 1.0);
        assert_eq!(b.max_cycle_hours, 2.0);
    }

    #[test]
    fn test_variants_and_overview() {
        let engine = ProcessMiningEngine::new();
        let model = engine.analyze(&sample_log());

        assert_eq!(model.variants.len(), 2);
        assert_eq!(model.variants[0].piece_count, 1);
        assert_eq!(model.variants[0].trace, "A → B");
        assert_eq!(model.variants[1].trace, "A → B → A → B");

        assert_eq!(model.overview.piece_count, 2);
        assert_eq!(model.overview.horizon_hours, 8.0);
        assert_eq!(model.overview.throughput_per_hour, Ratio::Defined(0.25));
        assert_eq!(model.overview.throughput_per_day, Ratio::Defined(6.0));
    }

    #[test]
    fn test_single_instant_event() {
        let engine = ProcessMiningEngine::new();
        let log = EventLog::from_events(vec![ev("P1", "A", 1, 1, 0.0, 0.0)]).unwrap();
        let model = engine.analyze(&log);

        assert_eq!(model.overview.lead_time_mean_hours, 0.0);
        assert_eq!(model.overview.throughput_per_hour, Ratio::Undefined);
        assert_eq!(model.operation_stats[0].mean_cycle_hours, 0.0);
    }
}
