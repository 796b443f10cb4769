// ==========================================
// 制造运营雷达 - 事件日志 CSV 读取器
// ==========================================
// 阶段:
// 0. 文件检查 (存在性 / 扩展名)
// 1. 表头校验 (列精确)
// 2. 逐行类型化 (带行号定位)
// 3. 工件内步骤编号 (无 sequence_index 列时推导)
// 4. EventLog 边界校验
// ==========================================

use crate::domain::event::{hours_between, CanonicalFlow, Event, EventLog};
use crate::error::DataIntegrityError;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_parser::RowFields;
use csv::ReaderBuilder;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// 输入契约列 (顺序即文档顺序)
pub const EVENT_LOG_COLUMNS: [&str; 16] = [
    "piece_id",
    "operation_name",
    "operation_sequence",
    "resource_id",
    "resource_qualification",
    "start_time",
    "end_time",
    "duration_hours",
    "status",
    "rework_of",
    "quality_check_passed",
    "defect_code",
    "cost",
    "value_add",
    "source_system",
    "batch_id",
];

/// 可选列: 显式给出工件内步骤序号
pub const SEQUENCE_INDEX_COLUMN: &str = "sequence_index";

/// duration_hours 与 end-start 的允许偏差 (小时)
const DURATION_TOLERANCE_HOURS: f64 = 0.01;

/// 未编号的事件 (行号用于后续报错)
struct ParsedRow {
    row_number: usize,
    sequence_index: Option<u32>,
    event: Event,
}

// ==========================================
// CsvEventLogReader
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CsvEventLogReader {
    flow: Option<CanonicalFlow>,
}

impl CsvEventLogReader {
    /// 标准流程由日志推导
    pub fn new() -> Self {
        Self { flow: None }
    }

    /// 使用注册的标准流程
    pub fn with_flow(flow: CanonicalFlow) -> Self {
        Self { flow: Some(flow) }
    }

    /// 从文件读取事件日志
    pub fn read_path(&self, path: &Path) -> ImportResult<EventLog> {
        if !path.exists() {
            return Err(ImportError::file_not_found(path));
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => {}
            _ => return Err(ImportError::unsupported_format(path)),
        }

        info!(path = %path.display(), "开始读取事件日志");
        let file = File::open(path)?;
        self.read_from(file)
    }

    /// 从内存文本读取
    pub fn read_str(&self, content: &str) -> ImportResult<EventLog> {
        self.read_from(content.as_bytes())
    }

    pub fn read_from<R: Read>(&self, source: R) -> ImportResult<EventLog> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let has_sequence_column = Self::check_headers(&headers)?;

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // 表头为第 1 行
            let row_number = idx + 2;
            let raw: HashMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(Self::parse_row(&RowFields::new(&raw, row_number), has_sequence_column)?);
        }

        debug!(rows = rows.len(), "事件行解析完成");
        let events = Self::number_steps(rows)?;

        let log = match &self.flow {
            Some(flow) => EventLog::new(events, flow.clone())?,
            None => EventLog::from_events(events)?,
        };

        info!(
            log_version = %log.version_id(),
            pieces = log.piece_count(),
            events = log.event_count(),
            operations = log.flow().len(),
            "事件日志校验通过"
        );
        Ok(log)
    }

    /// 表头校验,返回是否携带 sequence_index 列
    fn check_headers(headers: &[String]) -> Result<bool, DataIntegrityError> {
        for column in EVENT_LOG_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(DataIntegrityError::MissingField {
                    row: 1,
                    field: column.to_string(),
                });
            }
        }

        for header in headers {
            if header != SEQUENCE_INDEX_COLUMN && !EVENT_LOG_COLUMNS.contains(&header.as_str()) {
                warn!(column = %header, "忽略未知列");
            }
        }

        Ok(headers.iter().any(|h| h == SEQUENCE_INDEX_COLUMN))
    }

    fn parse_row(fields: &RowFields<'_>, has_sequence_column: bool) -> Result<ParsedRow, DataIntegrityError> {
        let start_time = fields.required_datetime("start_time")?;
        let end_time = fields.required_datetime("end_time")?;

        let duration = fields.required_f64("duration_hours")?;
        if end_time >= start_time {
            let actual = hours_between(start_time, end_time);
            if (duration - actual).abs() > DURATION_TOLERANCE_HOURS {
                return Err(fields.invalid(
                    "duration_hours",
                    &duration.to_string(),
                    &format!("与 end_time - start_time ({:.3} h) 不一致", actual),
                ));
            }
        }

        let sequence_index = if has_sequence_column {
            Some(fields.required_u32(SEQUENCE_INDEX_COLUMN)?)
        } else {
            None
        };

        let event = Event {
            piece_id: fields.required_string("piece_id")?,
            operation_name: fields.required_string("operation_name")?,
            operation_sequence: fields.required_u32("operation_sequence")?,
            resource_id: fields.required_string("resource_id")?,
            resource_qualification: fields.required_string("resource_qualification")?,
            sequence_index: 0,
            start_time,
            end_time,
            status: fields.required_status("status")?,
            rework_of: fields.optional_u32("rework_of")?,
            quality_check_passed: fields.required_bool("quality_check_passed")?,
            defect_code: fields.optional_string("defect_code"),
            cost: fields.required_f64("cost")?,
            value_add: fields.required_bool("value_add")?,
            source_system: fields.required_string("source_system")?,
            batch_id: fields.required_string("batch_id")?,
        };

        Ok(ParsedRow {
            row_number: fields.row_number(),
            sequence_index,
            event,
        })
    }

    /// 工件内步骤编号
    ///
    /// 显式列优先;否则按 (start, end, 标准位置, 正常先于返工, 行号) 排序后从 1 编号
    fn number_steps(rows: Vec<ParsedRow>) -> Result<Vec<Event>, DataIntegrityError> {
        let mut by_piece: BTreeMap<String, Vec<ParsedRow>> = BTreeMap::new();
        for row in rows {
            by_piece.entry(row.event.piece_id.clone()).or_default().push(row);
        }

        let mut events = Vec::new();
        for (_piece, mut piece_rows) in by_piece {
            let explicit: Option<Vec<u32>> = piece_rows.iter().map(|r| r.sequence_index).collect();
            if let Some(indices) = explicit {
                for (row, sequence_index) in piece_rows.into_iter().zip(indices) {
                    let mut event = row.event;
                    event.sequence_index = sequence_index;
                    events.push(event);
                }
                continue;
            }

            piece_rows.sort_by(|a, b| {
                a.event
                    .start_time
                    .cmp(&b.event.start_time)
                    .then(a.event.end_time.cmp(&b.event.end_time))
                    .then(a.event.operation_sequence.cmp(&b.event.operation_sequence))
                    .then(a.event.status.cmp(&b.event.status))
                    .then(a.row_number.cmp(&b.row_number))
            });
            for (idx, row) in piece_rows.into_iter().enumerate() {
                let mut event = row.event;
                event.sequence_index = idx as u32 + 1;
                events.push(event);
            }
        }
        Ok(events)
    }
}
