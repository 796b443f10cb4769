// ==========================================
// 制造运营雷达 - 字段解析器
// ==========================================
// 职责: 原始文本行 → 类型化字段 (带行号的错误定位)
// ==========================================

use crate::domain::types::EventStatus;
use crate::error::DataIntegrityError;
use chrono::NaiveDateTime;
use std::collections::HashMap;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// 单行字段访问
pub struct RowFields<'a> {
    row: &'a HashMap<String, String>,
    row_number: usize,
}

impl<'a> RowFields<'a> {
    pub fn new(row: &'a HashMap<String, String>, row_number: usize) -> Self {
        Self { row, row_number }
    }

    pub fn row_number(&self) -> usize {
        self.row_number
    }

    /// 非空文本字段
    pub fn optional_str(&self, field: &str) -> Option<&'a str> {
        self.row
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// 必填文本字段
    pub fn required_str(&self, field: &str) -> Result<&'a str, DataIntegrityError> {
        self.optional_str(field)
            .ok_or_else(|| DataIntegrityError::MissingField {
                row: self.row_number,
                field: field.to_string(),
            })
    }

    pub fn required_string(&self, field: &str) -> Result<String, DataIntegrityError> {
        self.required_str(field).map(str::to_string)
    }

    pub fn required_f64(&self, field: &str) -> Result<f64, DataIntegrityError> {
        let raw = self.required_str(field)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.invalid(field, raw, "不是有限数值")),
        }
    }

    /// 整数字段 (兼容 "3.0" 形式)
    pub fn required_u32(&self, field: &str) -> Result<u32, DataIntegrityError> {
        let raw = self.required_str(field)?;
        parse_integral(raw).ok_or_else(|| self.invalid(field, raw, "不是非负整数"))
    }

    pub fn optional_u32(&self, field: &str) -> Result<Option<u32>, DataIntegrityError> {
        match self.optional_str(field) {
            None => Ok(None),
            Some(raw) if is_null_token(raw) => Ok(None),
            Some(raw) => parse_integral(raw)
                .map(Some)
                .ok_or_else(|| self.invalid(field, raw, "不是非负整数")),
        }
    }

    pub fn optional_string(&self, field: &str) -> Option<String> {
        self.optional_str(field)
            .filter(|raw| !is_null_token(raw))
            .map(str::to_string)
    }

    pub fn required_bool(&self, field: &str) -> Result<bool, DataIntegrityError> {
        let raw = self.required_str(field)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(true),
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Err(self.invalid(field, raw, "不是布尔值")),
        }
    }

    pub fn required_datetime(&self, field: &str) -> Result<NaiveDateTime, DataIntegrityError> {
        let raw = self.required_str(field)?;
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| self.invalid(field, raw, "期望 YYYY-MM-DD HH:MM:SS"))
    }

    pub fn required_status(&self, field: &str) -> Result<EventStatus, DataIntegrityError> {
        let raw = self.required_str(field)?;
        match raw.to_ascii_lowercase().as_str() {
            "normal" => Ok(EventStatus::Normal),
            "rework" => Ok(EventStatus::Rework),
            _ => Err(self.invalid(field, raw, "期望 normal 或 rework")),
        }
    }

    pub fn invalid(&self, field: &str, value: &str, message: &str) -> DataIntegrityError {
        DataIntegrityError::InvalidField {
            row: self.row_number,
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}

fn is_null_token(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "null" | "none" | "nan")
}

fn parse_integral(raw: &str) -> Option<u32> {
    if let Ok(v) = raw.parse::<u32>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
        Some(v as u32)
    } else {
        None
    }
}
