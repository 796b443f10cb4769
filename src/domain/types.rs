// ==========================================
// 制造运营雷达 - 领域类型定义
// ==========================================
// 职责: 事件状态、比值哨兵、建议类型、优先级等级
// 红线: 除零不产生 f64 特殊值,一律显式表达为 Unbounded / Undefined
// ==========================================

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 无界哨兵的序列化标记
pub const UNBOUNDED_TOKEN: &str = "unbounded";

/// 未定义哨兵的序列化标记
pub const UNDEFINED_TOKEN: &str = "undefined";

// ==========================================
// 事件状态 (Event Status)
// ==========================================
// 序列化格式: 小写 (与事件日志 status 列一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Normal, // 正常加工
    Rework, // 返工
}

impl EventStatus {
    pub fn is_rework(&self) -> bool {
        matches!(self, EventStatus::Rework)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Normal => write!(f, "normal"),
            EventStatus::Rework => write!(f, "rework"),
        }
    }
}

// ==========================================
// 比值 (Ratio)
// ==========================================
// 所有除法结果的统一载体:
// - Defined(v): 正常数值
// - Unbounded:  分母为零且语义为"严重度无上限" (如 wait/cycle 中 cycle=0)
// - Undefined:  分母为零且语义为"无样本" (如零访问工序的返工率)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Defined(f64),
    Unbounded,
    Undefined,
}

impl Ratio {
    /// 普通比值: 分母为零时为 Undefined
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return Ratio::Undefined;
        }
        Self::checked(numerator / denominator)
    }

    /// 严重度比值: 分母为零时为 Unbounded
    pub fn severity(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return Ratio::Unbounded;
        }
        Self::checked(numerator / denominator)
    }

    fn checked(value: f64) -> Self {
        if value.is_finite() {
            Ratio::Defined(value)
        } else {
            Ratio::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Ratio::Unbounded)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Ratio::Undefined)
    }

    /// 对已定义值做变换,哨兵原样传递
    pub fn map<F: FnOnce(f64) -> f64>(self, f: F) -> Self {
        match self {
            Ratio::Defined(v) => Self::checked(f(v)),
            other => other,
        }
    }

    /// 已定义值,否则给定缺省值
    pub fn defined_or(&self, default: f64) -> f64 {
        self.value().unwrap_or(default)
    }

    /// 严重度比较: Undefined < Defined(任意) < Unbounded
    pub fn cmp_severity(&self, other: &Ratio) -> Ordering {
        fn rank(r: &Ratio) -> u8 {
            match r {
                Ratio::Undefined => 0,
                Ratio::Defined(_) => 1,
                Ratio::Unbounded => 2,
            }
        }
        match (self, other) {
            (Ratio::Defined(a), Ratio::Defined(b)) => a.total_cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{:.4}", v),
            Ratio::Unbounded => write!(f, "{}", UNBOUNDED_TOKEN),
            Ratio::Undefined => write!(f, "{}", UNDEFINED_TOKEN),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Defined(v) => serializer.serialize_f64(*v),
            Ratio::Unbounded => serializer.serialize_str(UNBOUNDED_TOKEN),
            Ratio::Undefined => serializer.serialize_str(UNDEFINED_TOKEN),
        }
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRatio {
            Number(f64),
            Token(String),
        }

        match RawRatio::deserialize(deserializer)? {
            RawRatio::Number(v) => Ok(Ratio::Defined(v)),
            RawRatio::Token(t) if t == UNBOUNDED_TOKEN => Ok(Ratio::Unbounded),
            RawRatio::Token(t) if t == UNDEFINED_TOKEN => Ok(Ratio::Undefined),
            RawRatio::Token(t) => Err(de::Error::custom(format!("无法识别的比值标记: {}", t))),
        }
    }
}

// ==========================================
// 改进动作类型 (Action Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AddResource,        // 增加资源 (产能驱动的等待)
    StandardizeQuality, // 质量标准化 (返工驱动)
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::AddResource => write!(f, "add_resource"),
            ActionType::StandardizeQuality => write!(f, "standardize_quality"),
        }
    }
}

// ==========================================
// 优先级等级 (Priority Tier)
// ==========================================
// 顺序: High < Medium < Low (排序时 High 在前)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityTier::High => write!(f, "HIGH"),
            PriorityTier::Medium => write!(f, "MEDIUM"),
            PriorityTier::Low => write!(f, "LOW"),
        }
    }
}

// ==========================================
// WIP 统计范围 (WIP Scope)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "operation")]
pub enum WipScope {
    Global,
    Operation(String),
}

impl fmt::Display for WipScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WipScope::Global => write!(f, "GLOBAL"),
            WipScope::Operation(name) => write!(f, "{}", name),
        }
    }
}
