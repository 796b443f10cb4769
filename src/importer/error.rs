// ==========================================
// 制造运营雷达 - 导入错误
// ==========================================
// 文件层错误带路径,CSV 层错误带物理行号,
// 字段层错误由 DataIntegrityError 携带数据行号
// ==========================================

use crate::error::DataIntegrityError;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("事件日志文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("不支持的事件日志格式: {path}（扩展名 '{extension}',仅接受 .csv）")]
    UnsupportedFormat { path: String, extension: String },

    #[error("读取事件日志失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 结构错误{}: {message}", line_suffix(.line))]
    Csv { line: Option<u64>, message: String },

    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|l| format!(" (第 {} 行)", l)).unwrap_or_default()
}

impl ImportError {
    pub fn file_not_found(path: &Path) -> Self {
        ImportError::FileNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn unsupported_format(path: &Path) -> Self {
        ImportError::UnsupportedFormat {
            path: path.display().to_string(),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => ImportError::Io(io),
            _ => ImportError::Csv { line, message },
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
