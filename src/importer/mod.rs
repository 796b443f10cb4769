// ==========================================
// 制造运营雷达 - 事件日志导入层
// ==========================================
// 职责: 读取列精确的事件日志 CSV,产出已校验的 EventLog
// 红线: 结构校验只在此边界做一次
// ==========================================

pub mod error;
pub mod event_log_reader;
pub mod field_parser;

pub use error::{ImportError, ImportResult};
pub use event_log_reader::{CsvEventLogReader, EVENT_LOG_COLUMNS};
