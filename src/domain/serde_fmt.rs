// ==========================================
// 制造运营雷达 - 结果序列化格式
// ==========================================
// 百分比字段序列化时统一保留一位小数
// 比值哨兵仍输出为 "unbounded" / "undefined" 标记
// ==========================================

use crate::domain::types::Ratio;

/// 四舍五入到一位小数 (消除 -0.0)
pub fn round1(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// f64 百分比字段
pub mod pct1 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::round1(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        f64::deserialize(deserializer)
    }
}

/// Ratio 百分比字段
pub mod ratio_pct1 {
    use crate::domain::types::Ratio;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Ratio, serializer: S) -> Result<S::Ok, S::Error> {
        super::round_ratio(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ratio, D::Error> {
        Ratio::deserialize(deserializer)
    }
}

pub fn round_ratio(value: Ratio) -> Ratio {
    match value {
        Ratio::Defined(v) => Ratio::Defined(round1(v)),
        other => other,
    }
}
