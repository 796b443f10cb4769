// ==========================================
// 制造运营雷达 - 统一错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - DataIntegrityError: 事件日志结构性错误,致命,不做部分分析
// - ConfigurationError: 成本模型/阈值缺失或非法,仅对优化引擎致命
// - 除零退化不是错误,由 Ratio::Unbounded / Ratio::Undefined 表达
// ==========================================

use thiserror::Error;

/// 事件日志完整性错误
///
/// 每个变体都指明违反的不变量以及出问题的工件/工序
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIntegrityError {
    #[error("事件日志为空")]
    EmptyLog,

    #[error("事件时间区间非法: piece_id={piece_id}, sequence_index={sequence_index}, end_time 早于 start_time")]
    InvalidInterval {
        piece_id: String,
        sequence_index: u32,
    },

    #[error("工序序号非严格递增: piece_id={piece_id}, 前序={previous}, 当前={current}")]
    NonMonotonicSequence {
        piece_id: String,
        previous: u32,
        current: u32,
    },

    #[error("开始时间回退: piece_id={piece_id}, sequence_index={sequence_index}")]
    NonMonotonicStart {
        piece_id: String,
        sequence_index: u32,
    },

    #[error("工序不在注册的标准流程中: piece_id={piece_id}, operation={operation}")]
    UnknownOperation { piece_id: String, operation: String },

    #[error("工序标准位置冲突: operation={operation}, 位置={first} 与 {second}")]
    ConflictingOperationPosition {
        operation: String,
        first: u32,
        second: u32,
    },

    #[error("标准流程中工序重复注册: operation={0}")]
    DuplicateOperation(String),

    #[error("返工引用无效: piece_id={piece_id}, sequence_index={sequence_index}, rework_of={rework_of}")]
    DanglingReworkReference {
        piece_id: String,
        sequence_index: u32,
        rework_of: u32,
    },

    #[error("必填字段缺失 (行 {row}): {field}")]
    MissingField { row: usize, field: String },

    #[error("字段值非法 (行 {row}, 字段 {field}): {value} - {message}")]
    InvalidField {
        row: usize,
        field: String,
        value: String,
        message: String,
    },
}

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("配置缺失: key={key}")]
    Missing { key: String },

    #[error("配置值非法: key={key}, value={value}, 原因: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        ConfigurationError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// 分析流程错误
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("数据完整性错误: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("分析任务执行失败: {0}")]
    TaskFailed(String),
}

/// Result 类型别名
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_names_piece_and_operation() {
        let err = DataIntegrityError::UnknownOperation {
            piece_id: "P0007".to_string(),
            operation: "Peinture".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("P0007"));
        assert!(msg.contains("Peinture"));

        let wrapped: AnalysisError = err.into();
        assert!(matches!(wrapped, AnalysisError::DataIntegrity(_)));
    }

    #[test]
    fn test_configuration_error_conversion() {
        let err = ConfigurationError::invalid("cost_model.horizon_months", 0, "必须大于 0");
        assert!(err.to_string().contains("cost_model.horizon_months"));

        let wrapped: AnalysisError = err.into();
        assert!(matches!(wrapped, AnalysisError::Configuration(_)));
    }
}
