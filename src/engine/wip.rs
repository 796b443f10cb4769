// ==========================================
// 制造运营雷达 - 在制品 (WIP) 分析引擎
// ==========================================
// 职责: 事件边界扫描得到 WIP 序列 / 工序 WIP 统计 / 堆积点
//       流动效率 / 利特尔法则一致性检查
// 扫描规则: 同一时刻先处理结束 (-1) 再处理开始 (+1)
// 红线: 利特尔法则偏差只作为数据质量告警,不中断分析
// ==========================================

use crate::config::AnalysisConfig;
use crate::domain::bundle::DataQualityWarning;
use crate::domain::event::{hours_between, Event, EventLog};
use crate::domain::process::ProcessModel;
use crate::domain::types::{Ratio, WipScope};
use crate::domain::wip::{
    FlowEfficiency, LittleLawCheck, OperationWipStats, WipAccumulationPoint, WipRecord, WipReport,
    WipSeries,
};
use crate::engine::process_mining::mean;
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// 利特尔法则偏差告警代码
pub const LITTLE_LAW_WARNING: &str = "LITTLE_LAW_DEVIATION";

// ==========================================
// WipAnalyzer - WIP 分析引擎
// ==========================================
pub struct WipAnalyzer {
    accumulation_multiplier: f64,
    little_law_tolerance: f64,
}

impl WipAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            accumulation_multiplier: config.wip_accumulation_multiplier,
            little_law_tolerance: config.little_law_tolerance,
        }
    }

    /// 完整 WIP 分析
    pub fn analyze(&self, log: &EventLog, model: &ProcessModel) -> WipReport {
        let horizon = (log.horizon_start(), log.horizon_end());

        let global = self.series(WipScope::Global, log.events(), horizon);

        let mut by_operation = Vec::new();
        let mut operation_stats = Vec::new();
        for op in log.flow().operations() {
            let events: Vec<&Event> = log
                .events()
                .filter(|e| e.operation_name == op.name)
                .collect();
            if events.is_empty() {
                continue;
            }
            let series = self.series(
                WipScope::Operation(op.name.clone()),
                events.iter().copied(),
                horizon,
            );
            operation_stats.push(OperationWipStats {
                operation: op.name.clone(),
                position: op.position,
                wip_mean: series.wip_mean,
                wip_max: series.wip_max,
                event_count: events.len(),
            });
            by_operation.push(series);
        }

        let accumulation_points = self.accumulation_points(&operation_stats);
        let flow_efficiency = self.flow_efficiency(log);
        let little_law = self.little_law(
            global.wip_mean,
            model.overview.throughput_per_hour,
            model.lead_time_mean_hours(),
        );

        info!(
            wip_mean = %global.wip_mean,
            wip_max = global.wip_max,
            accumulation_points = accumulation_points.len(),
            flow_efficiency = %flow_efficiency.flow_efficiency,
            little_law_ok = little_law.within_tolerance,
            "WIP 分析完成"
        );

        WipReport {
            global,
            by_operation,
            operation_stats,
            accumulation_points,
            flow_efficiency,
            little_law,
        }
    }

    // ==========================================
    // 扫描
    // ==========================================

    /// 事件边界扫描
    ///
    /// 每个不同时刻输出一条记录,值为该时刻全部边界处理完后的并发数
    pub fn sweep<'a, I>(&self, scope: &WipScope, events: I) -> Vec<WipRecord>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut boundaries: Vec<(NaiveDateTime, i8)> = Vec::new();
        for event in events {
            boundaries.push((event.start_time, 1));
            boundaries.push((event.end_time, -1));
        }
        // -1 排在 +1 之前
        boundaries.sort();

        let mut records: Vec<WipRecord> = Vec::new();
        let mut current: i64 = 0;
        for (timestamp, delta) in boundaries {
            current += delta as i64;
            let count = current.max(0) as u32;
            match records.last_mut() {
                Some(last) if last.timestamp == timestamp => last.concurrent_count = count,
                _ => records.push(WipRecord {
                    scope: scope.clone(),
                    timestamp,
                    concurrent_count: count,
                }),
            }
        }
        records
    }

    /// 时间加权平均 WIP (观察期为 0 时 undefined)
    pub fn time_weighted_mean(
        &self,
        records: &[WipRecord],
        horizon: (NaiveDateTime, NaiveDateTime),
    ) -> Ratio {
        let (start, end) = horizon;
        let total_hours = hours_between(start, end);
        if total_hours <= 0.0 {
            return Ratio::Undefined;
        }

        let mut area = 0.0;
        for pair in records.windows(2) {
            let from = pair[0].timestamp.max(start);
            let to = pair[1].timestamp.min(end);
            if to > from {
                area += pair[0].concurrent_count as f64 * hours_between(from, to);
            }
        }
        Ratio::of(area, total_hours)
    }

    fn series<'a, I>(
        &self,
        scope: WipScope,
        events: I,
        horizon: (NaiveDateTime, NaiveDateTime),
    ) -> WipSeries
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let records = self.sweep(&scope, events);
        let wip_mean = self.time_weighted_mean(&records, horizon);
        let wip_max = records.iter().map(|r| r.concurrent_count).max().unwrap_or(0);
        debug!(scope = %scope, points = records.len(), wip_max, "WIP 序列");
        WipSeries {
            scope,
            records,
            wip_mean,
            wip_max,
        }
    }

    // ==========================================
    // 堆积点 / 流动效率 / 利特尔法则
    // ==========================================

    /// WIP 堆积点: 工序平均 WIP > 倍数 × 各工序平均 WIP 的均值
    pub fn accumulation_points(&self, stats: &[OperationWipStats]) -> Vec<WipAccumulationPoint> {
        let means: Vec<f64> = stats.iter().filter_map(|s| s.wip_mean.value()).collect();
        let average = mean(&means);
        if average <= 0.0 {
            return Vec::new();
        }

        let threshold = self.accumulation_multiplier * average;
        let mut points: Vec<WipAccumulationPoint> = stats
            .iter()
            .filter_map(|s| {
                let wip_mean = s.wip_mean.value()?;
                (wip_mean > threshold).then(|| WipAccumulationPoint {
                    operation: s.operation.clone(),
                    wip_mean,
                    wip_excess: wip_mean - average,
                    wip_excess_pct: (wip_mean / average - 1.0) * 100.0,
                })
            })
            .collect();
        points.sort_by(|a, b| {
            b.wip_mean
                .total_cmp(&a.wip_mean)
                .then_with(|| a.operation.cmp(&b.operation))
        });
        points
    }

    /// 流动效率 = 正常事件加工时长总和 / 交付周期总和
    ///
    /// 返工时长计为非增值
    pub fn flow_efficiency(&self, log: &EventLog) -> FlowEfficiency {
        let total_value_add_hours: f64 = log
            .events()
            .filter(|e| !e.status.is_rework())
            .map(|e| e.duration_hours())
            .sum();
        let total_lead_time_hours: f64 = log.traces().iter().map(|t| t.lead_time_hours()).sum();
        let pieces = log.piece_count() as f64;

        FlowEfficiency {
            total_value_add_hours,
            total_lead_time_hours,
            flow_efficiency: Ratio::of(total_value_add_hours, total_lead_time_hours),
            mean_value_add_hours: total_value_add_hours / pieces,
            mean_waste_hours: (total_lead_time_hours - total_value_add_hours).max(0.0) / pieces,
        }
    }

    /// 利特尔法则: wip_mean ≈ throughput × lead_time_mean
    pub fn little_law(
        &self,
        wip_mean: Ratio,
        throughput_per_hour: Ratio,
        lead_time_mean_hours: f64,
    ) -> LittleLawCheck {
        let expected_wip = throughput_per_hour.map(|t| t * lead_time_mean_hours);
        let relative_deviation = match (wip_mean, expected_wip) {
            (Ratio::Defined(actual), Ratio::Defined(expected)) => {
                Ratio::of((actual - expected).abs(), actual)
            }
            _ => Ratio::Undefined,
        };
        let within_tolerance = matches!(
            relative_deviation,
            Ratio::Defined(d) if d <= self.little_law_tolerance
        );

        LittleLawCheck {
            wip_mean,
            throughput_per_hour,
            lead_time_mean_hours,
            expected_wip,
            relative_deviation,
            tolerance: self.little_law_tolerance,
            within_tolerance,
        }
    }

    /// 偏差超出容忍度时生成数据质量告警
    pub fn little_law_warning(&self, check: &LittleLawCheck) -> Option<DataQualityWarning> {
        let deviation = check.relative_deviation.value()?;
        if deviation <= check.tolerance {
            return None;
        }

        warn!(
            wip_mean = %check.wip_mean,
            expected_wip = %check.expected_wip,
            deviation,
            tolerance = check.tolerance,
            "利特尔法则偏差超出容忍度"
        );
        Some(DataQualityWarning::new(
            LITTLE_LAW_WARNING,
            format!(
                "平均 WIP {} 与 吞吐率 × 平均交付周期 {} 的相对偏差 {:.1}% 超出容忍度 {:.1}%",
                check.wip_mean,
                check.expected_wip,
                deviation * 100.0,
                check.tolerance * 100.0
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::test_events::*;
    use crate::engine::process_mining::ProcessMiningEngine;

    fn analyzer() -> WipAnalyzer {
        WipAnalyzer::new(&AnalysisConfig::default())
    }

    fn report(events: Vec<Event>) -> WipReport {
        let log = EventLog::from_events(events).unwrap();
        let model = ProcessMiningEngine::new().analyze(&log);
        analyzer().analyze(&log, &model)
    }

    #[test]
    fn test_handoff_closes_before_opens() {
        // A 结束与 B 开始同一时刻,不应出现 2
        let wip = report(vec![ev("P1", "A", 1, 1, 0.0, 2.0), ev("P1", "B", 2, 2, 2.0, 4.0)]);
        let counts: Vec<u32> = wip.global.records.iter().map(|r| r.concurrent_count).collect();
        assert_eq!(counts, vec![1, 1, 0]);
        assert_eq!(wip.global.wip_max, 1);
        assert_eq!(wip.global.wip_mean, Ratio::Defined(1.0));
    }

    #[test]
    fn test_time_weighted_mean_and_operation_series() {
        // 0-4: P1@A; 2-6: P2@A; 6-8: P2@B
        let wip = report(vec![
            ev("P1", "A", 1, 1, 0.0, 4.0),
            ev("P2", "A", 1, 1, 2.0, 6.0),
            ev("P2", "B", 2, 2, 6.0, 8.0),
        ]);
        // 面积: 0-2 为 1, 2-4 为 2, 4-6 为 1, 6-8 为 1 → 10 / 8
        assert_eq!(wip.global.wip_mean, Ratio::Defined(1.25));
        assert_eq!(wip.global.wip_max, 2);

        let a = wip.stats_for("A").unwrap();
        assert_eq!(a.wip_mean, Ratio::Defined(1.0));
        assert_eq!(a.wip_max, 2);
        let b = wip.stats_for("B").unwrap();
        assert_eq!(b.wip_mean, Ratio::Defined(0.25));
        assert_eq!(wip.by_operation.len(), 2);
    }

    #[test]
    fn test_accumulation_points() {
        let stats: Vec<OperationWipStats> = [("A", 1.0), ("B", 4.0), ("C", 1.0)]
            .iter()
            .enumerate()
            .map(|(i, (op, m))| OperationWipStats {
                operation: op.to_string(),
                position: i as u32 + 1,
                wip_mean: Ratio::Defined(*m),
                wip_max: 4,
                event_count: 3,
            })
            .collect();
        let points = analyzer().accumulation_points(&stats);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].operation, "B");
        assert_eq!(points[0].wip_excess, 2.0);
        assert_eq!(points[0].wip_excess_pct, 100.0);
    }

    #[test]
    fn test_flow_efficiency_excludes_rework() {
        // 交付周期 10h,正常加工 2h,返工 1h
        let wip = report(vec![
            ev("P1", "A", 1, 1, 0.0, 1.0),
            rework("P1", "A", 1, 2, 5.0, 6.0, Some(1)),
            ev("P1", "B", 2, 3, 9.0, 10.0),
        ]);
        let fe = &wip.flow_efficiency;
        assert_eq!(fe.total_value_add_hours, 2.0);
        assert_eq!(fe.total_lead_time_hours, 10.0);
        assert_eq!(fe.flow_efficiency, Ratio::Defined(0.2));
        assert_eq!(fe.mean_waste_hours, 8.0);
    }

    #[test]
    fn test_little_law_exact_for_contiguous_pieces() {
        // 无等待的连续加工,WIP 与 throughput × lead_time 完全一致
        let wip = report(vec![
            ev("P1", "A", 1, 1, 0.0, 2.0),
            ev("P1", "B", 2, 2, 2.0, 4.0),
            ev("P2", "A", 1, 1, 1.0, 3.0),
            ev("P2", "B", 2, 2, 3.0, 5.0),
        ]);
        let check = &wip.little_law;
        assert!(check.within_tolerance);
        assert!(check.relative_deviation.value().unwrap() < 1e-9);
        assert!(analyzer().little_law_warning(check).is_none());
    }

    #[test]
    fn test_little_law_deviation_warns() {
        let check = analyzer().little_law(Ratio::Defined(2.0), Ratio::Defined(0.5), 2.0);
        assert_eq!(check.expected_wip, Ratio::Defined(1.0));
        assert_eq!(check.relative_deviation, Ratio::Defined(0.5));
        assert!(!check.within_tolerance);

        let warning = analyzer().little_law_warning(&check).unwrap();
        assert_eq!(warning.code, LITTLE_LAW_WARNING);
    }

    #[test]
    fn test_instant_log_is_undefined_not_crash() {
        let wip = report(vec![ev("P1", "A", 1, 1, 0.0, 0.0)]);
        assert_eq!(wip.global.wip_mean, Ratio::Undefined);
        assert_eq!(wip.flow_efficiency.flow_efficiency, Ratio::Undefined);
        assert!(!wip.little_law.within_tolerance);
        assert!(wip.global.records.iter().all(|r| r.concurrent_count == 0));
    }
}
