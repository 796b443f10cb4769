// ==========================================
// 事件日志构建器 - 用于集成测试
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ops_radar::config::CostModel;
use ops_radar::domain::{Event, EventStatus};

/// 测试基准时间
pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 9, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// 基准时间 + 小时偏移 (毫秒精度)
pub fn at(hours: f64) -> NaiveDateTime {
    base_time() + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

// ==========================================
// Event 构建器
// ==========================================

pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(piece_id: &str, operation: &str, position: u32, sequence_index: u32) -> Self {
        Self {
            event: Event {
                piece_id: piece_id.to_string(),
                operation_name: operation.to_string(),
                operation_sequence: position,
                resource_id: format!("R-{}", operation),
                resource_qualification: "L2".to_string(),
                sequence_index,
                start_time: base_time(),
                end_time: base_time(),
                status: EventStatus::Normal,
                rework_of: None,
                quality_check_passed: true,
                defect_code: None,
                cost: 0.0,
                value_add: true,
                source_system: "MES".to_string(),
                batch_id: "B001".to_string(),
            },
        }
    }

    /// 起止时间 (相对基准时间的小时数),成本按 40/小时
    pub fn hours(mut self, start: f64, end: f64) -> Self {
        self.event.start_time = at(start);
        self.event.end_time = at(end);
        self.event.cost = 40.0 * (end - start);
        self
    }

    pub fn resource(mut self, resource_id: &str) -> Self {
        self.event.resource_id = resource_id.to_string();
        self
    }

    /// 标记为返工
    pub fn rework(mut self, rework_of: Option<u32>) -> Self {
        self.event.status = EventStatus::Rework;
        self.event.rework_of = rework_of;
        self.event.value_add = false;
        self
    }

    /// 质检未通过
    pub fn failed(mut self, defect_code: &str) -> Self {
        self.event.quality_check_passed = false;
        self.event.defect_code = Some(defect_code.to_string());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

// ==========================================
// 场景数据
// ==========================================

pub const SCENARIO_A_OPERATIONS: [&str; 8] = [
    "CUT", "WELD", "DRILL", "MILL", "HEAT", "GRIND", "PAINT", "INSPECT",
];

/// 150 件 × 8 道工序;前 98 件各在一道工序上有一次失败加工与一次重做
///
/// 共 1298 个事件,其中 196 个返工实例 (约 15.1%)。
/// 加工 0.1 小时,工序间等待 8 小时,HEAT 前等待 20 小时。
pub fn scenario_a_events() -> Vec<Event> {
    let mut events = Vec::with_capacity(1298);

    for i in 0..150usize {
        let piece_id = format!("P{:03}", i + 1);
        let rework_at = if i < 98 { Some(i % 8) } else { None };
        let mut t = i as f64 * 0.5;
        let mut seq = 1;

        for (k, op) in SCENARIO_A_OPERATIONS.iter().enumerate() {
            let position = k as u32 + 1;
            if k > 0 {
                t += if *op == "HEAT" { 20.0 } else { 8.0 };
            }

            if rework_at == Some(k) {
                let failed_seq = seq;
                events.push(
                    EventBuilder::new(&piece_id, op, position, seq)
                        .hours(t, t + 0.1)
                        .rework(None)
                        .failed(&format!("D-{}", op))
                        .build(),
                );
                seq += 1;
                t += 0.1;
                events.push(
                    EventBuilder::new(&piece_id, op, position, seq)
                        .hours(t, t + 0.1)
                        .rework(Some(failed_seq))
                        .build(),
                );
            } else {
                events.push(
                    EventBuilder::new(&piece_id, op, position, seq)
                        .hours(t, t + 0.1)
                        .build(),
                );
            }
            seq += 1;
            t += 0.1;
        }
    }

    events
}

/// 首尾相接的工件: 第 i 件在 [i, i+1] 经过 A,[i+1, i+2] 经过 B
pub fn contiguous_events(pieces: usize) -> Vec<Event> {
    (0..pieces)
        .flat_map(|i| {
            let piece_id = format!("P{}", i + 1);
            let t = i as f64;
            vec![
                EventBuilder::new(&piece_id, "A", 1, 1).hours(t, t + 1.0).build(),
                EventBuilder::new(&piece_id, "B", 2, 2).hours(t + 1.0, t + 2.0).build(),
            ]
        })
        .collect()
}

pub fn cost_model() -> CostModel {
    CostModel {
        resource_add_cost: 45_000.0,
        quality_program_cost_per_operation: 15_000.0,
        discount_rate: 0.08,
        horizon_months: 12,
        value_per_lead_time_hour: 40.0,
    }
}

// ==========================================
// CSV 输出
// ==========================================

/// 按输入契约列序输出 CSV (不含 sequence_index 列)
pub fn events_to_csv(events: &[Event]) -> String {
    let mut out = String::from(
        "piece_id,operation_name,operation_sequence,resource_id,resource_qualification,\
         start_time,end_time,duration_hours,status,rework_of,quality_check_passed,\
         defect_code,cost,value_add,source_system,batch_id\n",
    );
    for e in events {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{:.4},{},{},{},{},{},{},{},{}\n",
            e.piece_id,
            e.operation_name,
            e.operation_sequence,
            e.resource_id,
            e.resource_qualification,
            e.start_time.format("%Y-%m-%d %H:%M:%S"),
            e.end_time.format("%Y-%m-%d %H:%M:%S"),
            e.duration_hours(),
            e.status,
            e.rework_of.map(|r| r.to_string()).unwrap_or_default(),
            e.quality_check_passed,
            e.defect_code.clone().unwrap_or_default(),
            e.cost,
            e.value_add,
            e.source_system,
            e.batch_id,
        ));
    }
    out
}
