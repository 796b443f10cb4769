// ==========================================
// 制造运营雷达 - 事件日志实体
// ==========================================
// 职责: 事件 / 工序 / 标准流程 / 工件轨迹 / 事件日志
// 红线: 事件日志在边界处一次性校验,下游分析器不再重复校验
// 红线: 构造完成后不可变
// ==========================================

use crate::domain::types::EventStatus;
use crate::error::DataIntegrityError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 两个时间点之间的小时数
pub fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

// ==========================================
// Event - 工序事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub piece_id: String,
    pub operation_name: String,
    /// 工序在标准流程中的位置
    pub operation_sequence: u32,
    pub resource_id: String,
    pub resource_qualification: String,
    /// 工件轨迹内的步骤序号 (严格递增)
    pub sequence_index: u32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: EventStatus,
    /// 返工所对应的原始步骤序号
    pub rework_of: Option<u32>,
    pub quality_check_passed: bool,
    pub defect_code: Option<String>,
    pub cost: f64,
    pub value_add: bool,
    pub source_system: String,
    pub batch_id: String,
}

impl Event {
    /// 加工时长 (小时)
    pub fn duration_hours(&self) -> f64 {
        hours_between(self.start_time, self.end_time)
    }
}

// ==========================================
// Operation - 标准流程中的工位
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub position: u32,
}

impl Operation {
    pub fn new(name: &str, position: u32) -> Self {
        Self {
            name: name.to_string(),
            position,
        }
    }
}

// ==========================================
// CanonicalFlow - 标准工序流程
// ==========================================
// 用于区分前进与返工回退 (目标位置 <= 来源位置)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFlow {
    operations: Vec<Operation>,
    positions: BTreeMap<String, u32>,
}

impl CanonicalFlow {
    /// 由注册的工序列表构建
    pub fn from_operations(operations: Vec<Operation>) -> Result<Self, DataIntegrityError> {
        let mut positions = BTreeMap::new();
        for op in &operations {
            if positions.insert(op.name.clone(), op.position).is_some() {
                return Err(DataIntegrityError::DuplicateOperation(op.name.clone()));
            }
        }
        Ok(Self::sorted(operations, positions))
    }

    /// 由事件中观察到的 (operation_name, operation_sequence) 推导
    pub fn derive_from_events(events: &[Event]) -> Result<Self, DataIntegrityError> {
        let mut positions: BTreeMap<String, u32> = BTreeMap::new();
        for event in events {
            match positions.get(&event.operation_name) {
                Some(&existing) if existing != event.operation_sequence => {
                    return Err(DataIntegrityError::ConflictingOperationPosition {
                        operation: event.operation_name.clone(),
                        first: existing,
                        second: event.operation_sequence,
                    });
                }
                Some(_) => {}
                None => {
                    positions.insert(event.operation_name.clone(), event.operation_sequence);
                }
            }
        }

        let operations = positions
            .iter()
            .map(|(name, &position)| Operation::new(name, position))
            .collect();
        Ok(Self::sorted(operations, positions))
    }

    fn sorted(mut operations: Vec<Operation>, positions: BTreeMap<String, u32>) -> Self {
        operations.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        Self {
            operations,
            positions,
        }
    }

    /// 按标准位置升序的工序列表
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn position_of(&self, operation: &str) -> Option<u32> {
        self.positions.get(operation).copied()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.positions.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

// ==========================================
// Trace - 工件轨迹
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub piece_id: String,
    /// 按 sequence_index 升序
    pub events: Vec<Event>,
}

impl Trace {
    /// 交付周期: 最后事件结束 - 首事件开始 (小时)
    pub fn lead_time_hours(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => hours_between(first.start_time, last.end_time),
            _ => 0.0,
        }
    }

    /// 每个事件前的等待时间 (小时)
    ///
    /// 首事件为 0; 与前序事件重叠时截断为 0
    pub fn wait_times_hours(&self) -> Vec<f64> {
        let mut waits = Vec::with_capacity(self.events.len());
        let mut prev_end: Option<NaiveDateTime> = None;
        for event in &self.events {
            let wait = match prev_end {
                Some(end) => hours_between(end, event.start_time).max(0.0),
                None => 0.0,
            };
            waits.push(wait);
            prev_end = Some(event.end_time);
        }
        waits
    }
}

// ==========================================
// EventLog - 已校验的事件日志快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    version_id: String,
    flow: CanonicalFlow,
    traces: Vec<Trace>,
    event_count: usize,
}

impl EventLog {
    /// 以注册的标准流程构建并校验事件日志
    ///
    /// # 校验
    /// - 日志非空
    /// - end_time >= start_time
    /// - 工序属于标准流程,且 operation_sequence 与注册位置一致
    /// - 同一工件 sequence_index 严格递增、start_time 不回退
    /// - rework_of 指向同一工件更早的步骤
    pub fn new(events: Vec<Event>, flow: CanonicalFlow) -> Result<Self, DataIntegrityError> {
        if events.is_empty() {
            return Err(DataIntegrityError::EmptyLog);
        }

        let event_count = events.len();
        let mut by_piece: BTreeMap<String, Vec<Event>> = BTreeMap::new();

        for event in events {
            if event.end_time < event.start_time {
                return Err(DataIntegrityError::InvalidInterval {
                    piece_id: event.piece_id.clone(),
                    sequence_index: event.sequence_index,
                });
            }

            match flow.position_of(&event.operation_name) {
                None => {
                    return Err(DataIntegrityError::UnknownOperation {
                        piece_id: event.piece_id.clone(),
                        operation: event.operation_name.clone(),
                    })
                }
                Some(position) if position != event.operation_sequence => {
                    return Err(DataIntegrityError::ConflictingOperationPosition {
                        operation: event.operation_name.clone(),
                        first: position,
                        second: event.operation_sequence,
                    })
                }
                Some(_) => {}
            }

            by_piece.entry(event.piece_id.clone()).or_default().push(event);
        }

        let mut traces = Vec::with_capacity(by_piece.len());
        for (piece_id, mut piece_events) in by_piece {
            piece_events.sort_by_key(|e| e.sequence_index);
            Self::validate_trace(&piece_id, &piece_events)?;
            traces.push(Trace {
                piece_id,
                events: piece_events,
            });
        }

        let version_id = Self::compute_version_id(&flow, &traces);

        Ok(Self {
            version_id,
            flow,
            traces,
            event_count,
        })
    }

    /// 由事件自身的 operation_sequence 推导标准流程后构建
    pub fn from_events(events: Vec<Event>) -> Result<Self, DataIntegrityError> {
        if events.is_empty() {
            return Err(DataIntegrityError::EmptyLog);
        }
        let flow = CanonicalFlow::derive_from_events(&events)?;
        Self::new(events, flow)
    }

    fn validate_trace(piece_id: &str, events: &[Event]) -> Result<(), DataIntegrityError> {
        for pair in events.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.sequence_index <= prev.sequence_index {
                return Err(DataIntegrityError::NonMonotonicSequence {
                    piece_id: piece_id.to_string(),
                    previous: prev.sequence_index,
                    current: curr.sequence_index,
                });
            }
            if curr.start_time < prev.start_time {
                return Err(DataIntegrityError::NonMonotonicStart {
                    piece_id: piece_id.to_string(),
                    sequence_index: curr.sequence_index,
                });
            }
        }

        for event in events {
            if let Some(target) = event.rework_of {
                let valid = target < event.sequence_index
                    && events.iter().any(|e| e.sequence_index == target);
                if !valid {
                    return Err(DataIntegrityError::DanglingReworkReference {
                        piece_id: piece_id.to_string(),
                        sequence_index: event.sequence_index,
                        rework_of: target,
                    });
                }
            }
        }

        Ok(())
    }

    /// 内容寻址的版本号: 同一快照 (标准流程 + 轨迹) 始终得到同一 UUIDv5
    fn compute_version_id(flow: &CanonicalFlow, traces: &[Trace]) -> String {
        let mut payload = Vec::new();
        for op in flow.operations() {
            payload.extend_from_slice(op.name.as_bytes());
            payload.push(0x1f);
            payload.extend_from_slice(&op.position.to_be_bytes());
            payload.push(0x1e);
        }
        payload.push(0x1d);
        for trace in traces {
            payload.extend_from_slice(trace.piece_id.as_bytes());
            payload.push(0x1e);
            for event in &trace.events {
                // Event 只含 String/数值/时间字段,序列化不会失败
                if let Ok(bytes) = serde_json::to_vec(event) {
                    payload.extend_from_slice(&bytes);
                }
                payload.push(0x1f);
            }
        }
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &payload).to_string()
    }

    // ==========================================
    // 只读访问
    // ==========================================

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn flow(&self) -> &CanonicalFlow {
        &self.flow
    }

    /// 按 piece_id 升序的工件轨迹
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.traces.iter().flat_map(|t| t.events.iter())
    }

    pub fn piece_count(&self) -> usize {
        self.traces.len()
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// 观察期起点 (最早开始时间)
    pub fn horizon_start(&self) -> NaiveDateTime {
        self.events()
            .map(|e| e.start_time)
            .min()
            .unwrap_or_default()
    }

    /// 观察期终点 (最晚结束时间)
    pub fn horizon_end(&self) -> NaiveDateTime {
        self.events().map(|e| e.end_time).max().unwrap_or_default()
    }

    /// 观察期长度 (小时)
    pub fn horizon_hours(&self) -> f64 {
        hours_between(self.horizon_start(), self.horizon_end())
    }
}

// ==========================================
// 单元测试用事件构造
// ==========================================
#[cfg(test)]
pub(crate) mod test_events {
    use super::*;
    use chrono::{Duration, NaiveDate};

    pub fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 9, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    pub fn at(hours: f64) -> NaiveDateTime {
        base_time() + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
    }

    /// 正常事件 (时间以基准时刻起的小时数表示)
    pub fn ev(piece: &str, op: &str, position: u32, seq: u32, start: f64, end: f64) -> Event {
        Event {
            piece_id: piece.to_string(),
            operation_name: op.to_string(),
            operation_sequence: position,
            resource_id: format!("R-{}", op),
            resource_qualification: "N2".to_string(),
            sequence_index: seq,
            start_time: at(start),
            end_time: at(end),
            status: EventStatus::Normal,
            rework_of: None,
            quality_check_passed: true,
            defect_code: None,
            cost: 40.0 * (end - start),
            value_add: true,
            source_system: "MES".to_string(),
            batch_id: "B001".to_string(),
        }
    }

    /// 返工事件
    pub fn rework(
        piece: &str,
        op: &str,
        position: u32,
        seq: u32,
        start: f64,
        end: f64,
        rework_of: Option<u32>,
    ) -> Event {
        Event {
            status: EventStatus::Rework,
            rework_of,
            quality_check_passed: false,
            defect_code: Some("D-ALIGN".to_string()),
            value_add: false,
            ..ev(piece, op, position, seq, start, end)
        }
    }

    pub fn flow(names: &[&str]) -> CanonicalFlow {
        let ops = names
            .iter()
            .enumerate()
            .map(|(i, n)| Operation::new(n, i as u32 + 1))
            .collect();
        CanonicalFlow::from_operations(ops).unwrap()
    }
}
