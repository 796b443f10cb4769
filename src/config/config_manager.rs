// ==========================================
// 制造运营雷达 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 层次: 缺省值 → config_kv (global) → JSON 覆写文件
// ==========================================

use crate::config::analysis_config::{AnalysisConfig, CostModel};
use crate::db::open_sqlite_connection;
use crate::error::ConfigurationError;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 配置键值层 (键 → 原始文本值)
pub type ConfigLayer = BTreeMap<String, String>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并确保表结构存在（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            crate::db::init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 配置值 (UPSERT)
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        debug!(key = %key, value = %value, "配置已写入");
        Ok(())
    }

    /// 读取 global scope 的全部配置
    pub fn load_layer(&self) -> RepositoryResult<ConfigLayer> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut layer = ConfigLayer::new();
        for row in rows {
            let (key, value) = row?;
            layer.insert(key, value);
        }
        Ok(layer)
    }

    /// 获取所有配置的快照（JSON格式,键有序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let layer = self.load_layer()?;
        Ok(serde_json::to_string(&layer)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖同名的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let layer: ConfigLayer = serde_json::from_str(snapshot_json)?;

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for (key, value) in layer.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 分析配置: 缺省值叠加 config_kv
    pub fn load_analysis_config(&self) -> RepositoryResult<AnalysisConfig> {
        let layer = self.load_layer()?;
        Ok(resolve_analysis_config(&[&layer])?)
    }

    /// 成本模型: 全部来自 config_kv,缺任一键即报错
    pub fn load_cost_model(&self) -> RepositoryResult<CostModel> {
        let layer = self.load_layer()?;
        Ok(resolve_cost_model(&[&layer])?)
    }
}

// ==========================================
// 配置层解析
// ==========================================

/// 解析 JSON 覆写文件内容
///
/// 格式为扁平对象,键同 config_kv,值可为数字或字符串:
/// {"analysis.little_law_tolerance": 0.2, "cost_model.horizon_months": 12}
pub fn parse_json_layer(raw: &str) -> Result<ConfigLayer, ConfigurationError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ConfigurationError::invalid("<json>", raw.len(), &e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        ConfigurationError::invalid("<json>", "非对象", "配置文件顶层必须为 JSON 对象")
    })?;

    let mut layer = ConfigLayer::new();
    for (key, v) in object {
        let text = match v {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => {
                return Err(ConfigurationError::invalid(key, other, "仅支持数字或字符串"));
            }
        };
        layer.insert(key.clone(), text);
    }
    Ok(layer)
}

/// 按层次解析分析配置 (后面的层覆盖前面的层)
pub fn resolve_analysis_config(layers: &[&ConfigLayer]) -> Result<AnalysisConfig, ConfigurationError> {
    let mut config = AnalysisConfig::default();

    apply(layers, config_keys::WAIT_THRESHOLD_MULTIPLIER, &mut config.wait_threshold_multiplier)?;
    apply(layers, config_keys::WIP_BOTTLENECK_QUANTILE, &mut config.wip_bottleneck_quantile)?;
    apply(layers, config_keys::WIP_ACCUMULATION_MULTIPLIER, &mut config.wip_accumulation_multiplier)?;
    apply(layers, config_keys::UTILIZATION_THRESHOLD, &mut config.utilization_threshold)?;
    apply(layers, config_keys::LITTLE_LAW_TOLERANCE, &mut config.little_law_tolerance)?;

    let opt = &mut config.optimization;
    apply(layers, config_keys::REWORK_RATE_THRESHOLD, &mut opt.rework_rate_threshold)?;
    apply(layers, config_keys::CAPACITY_RATIO_THRESHOLD, &mut opt.capacity_ratio_threshold)?;
    apply(layers, config_keys::TOP_N, &mut opt.top_n)?;
    apply(layers, config_keys::RESOURCE_WIP_ELASTICITY, &mut opt.resource_wip_elasticity)?;
    apply(layers, config_keys::RESOURCE_LEADTIME_ELASTICITY, &mut opt.resource_leadtime_elasticity)?;
    apply(layers, config_keys::QUALITY_WIP_ELASTICITY, &mut opt.quality_wip_elasticity)?;
    apply(layers, config_keys::QUALITY_LEADTIME_ELASTICITY, &mut opt.quality_leadtime_elasticity)?;
    apply(layers, config_keys::COMPOSITION_DECAY, &mut opt.composition_decay)?;
    apply(layers, config_keys::DRIVER_WEIGHT, &mut opt.driver_weight)?;
    apply(layers, config_keys::ROI_WEIGHT, &mut opt.roi_weight)?;
    apply(layers, config_keys::HIGH_TIER_SCORE, &mut opt.high_tier_score)?;
    apply(layers, config_keys::MEDIUM_TIER_SCORE, &mut opt.medium_tier_score)?;

    config.validate()?;
    Ok(config)
}

/// 按层次解析成本模型
pub fn resolve_cost_model(layers: &[&ConfigLayer]) -> Result<CostModel, ConfigurationError> {
    let model = CostModel {
        resource_add_cost: require(layers, config_keys::RESOURCE_ADD_COST)?,
        quality_program_cost_per_operation: require(layers, config_keys::QUALITY_PROGRAM_COST)?,
        discount_rate: require(layers, config_keys::DISCOUNT_RATE)?,
        horizon_months: require(layers, config_keys::HORIZON_MONTHS)?,
        value_per_lead_time_hour: require(layers, config_keys::VALUE_PER_LEAD_TIME_HOUR)?,
    };
    model.validate()?;
    Ok(model)
}

/// 成本模型是否在任一层出现过 (用于判断是否进入优化阶段)
pub fn has_cost_model(layers: &[&ConfigLayer]) -> bool {
    layers
        .iter()
        .any(|layer| layer.keys().any(|k| k.starts_with(config_keys::COST_MODEL_PREFIX)))
}

fn lookup<'a>(layers: &[&'a ConfigLayer], key: &str) -> Option<&'a str> {
    layers
        .iter()
        .rev()
        .find_map(|layer| layer.get(key).map(String::as_str))
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigurationError::invalid(key, raw, "无法解析为数值"))
}

fn apply<T: FromStr>(
    layers: &[&ConfigLayer],
    key: &str,
    target: &mut T,
) -> Result<(), ConfigurationError> {
    if let Some(raw) = lookup(layers, key) {
        *target = parse_value(key, raw)?;
    }
    Ok(())
}

fn require<T: FromStr>(layers: &[&ConfigLayer], key: &str) -> Result<T, ConfigurationError> {
    match lookup(layers, key) {
        Some(raw) => parse_value(key, raw),
        None => Err(ConfigurationError::Missing {
            key: key.to_string(),
        }),
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 诊断阈值
    pub const WAIT_THRESHOLD_MULTIPLIER: &str = "analysis.wait_threshold_multiplier";
    pub const WIP_BOTTLENECK_QUANTILE: &str = "analysis.wip_bottleneck_quantile";
    pub const WIP_ACCUMULATION_MULTIPLIER: &str = "analysis.wip_accumulation_multiplier";
    pub const UTILIZATION_THRESHOLD: &str = "analysis.utilization_threshold";
    pub const LITTLE_LAW_TOLERANCE: &str = "analysis.little_law_tolerance";

    // 优化模型
    pub const REWORK_RATE_THRESHOLD: &str = "optimization.rework_rate_threshold";
    pub const CAPACITY_RATIO_THRESHOLD: &str = "optimization.capacity_ratio_threshold";
    pub const TOP_N: &str = "optimization.top_n";
    pub const RESOURCE_WIP_ELASTICITY: &str = "optimization.resource_wip_elasticity";
    pub const RESOURCE_LEADTIME_ELASTICITY: &str = "optimization.resource_leadtime_elasticity";
    pub const QUALITY_WIP_ELASTICITY: &str = "optimization.quality_wip_elasticity";
    pub const QUALITY_LEADTIME_ELASTICITY: &str = "optimization.quality_leadtime_elasticity";
    pub const COMPOSITION_DECAY: &str = "optimization.composition_decay";
    pub const DRIVER_WEIGHT: &str = "optimization.driver_weight";
    pub const ROI_WEIGHT: &str = "optimization.roi_weight";
    pub const HIGH_TIER_SCORE: &str = "optimization.high_tier_score";
    pub const MEDIUM_TIER_SCORE: &str = "optimization.medium_tier_score";

    // 成本模型 (无缺省值)
    pub const COST_MODEL_PREFIX: &str = "cost_model.";
    pub const RESOURCE_ADD_COST: &str = "cost_model.resource_add_cost";
    pub const QUALITY_PROGRAM_COST: &str = "cost_model.quality_program_cost_per_operation";
    pub const DISCOUNT_RATE: &str = "cost_model.discount_rate";
    pub const HORIZON_MONTHS: &str = "cost_model.horizon_months";
    pub const VALUE_PER_LEAD_TIME_HOUR: &str = "cost_model.value_per_lead_time_hour";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        (file, manager)
    }

    fn seed_cost_model(manager: &ConfigManager) {
        manager.set_config_value(config_keys::RESOURCE_ADD_COST, "45000").unwrap();
        manager.set_config_value(config_keys::QUALITY_PROGRAM_COST, "15000").unwrap();
        manager.set_config_value(config_keys::DISCOUNT_RATE, "0.08").unwrap();
        manager.set_config_value(config_keys::HORIZON_MONTHS, "12").unwrap();
        manager.set_config_value(config_keys::VALUE_PER_LEAD_TIME_HOUR, "40").unwrap();
    }

    #[test]
    fn test_empty_store_yields_defaults() {
        let (_file, manager) = manager();
        let config = manager.load_analysis_config().unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_stored_values_override_defaults() {
        let (_file, manager) = manager();
        manager.set_config_value(config_keys::TOP_N, "5").unwrap();
        manager.set_config_value(config_keys::LITTLE_LAW_TOLERANCE, "0.2").unwrap();
        manager.set_config_value(config_keys::TOP_N, "4").unwrap();

        let config = manager.load_analysis_config().unwrap();
        assert_eq!(config.optimization.top_n, 4);
        assert_eq!(config.little_law_tolerance, 0.2);
        assert_eq!(config.wait_threshold_multiplier, 2.0);
    }

    #[test]
    fn test_unparsable_value_is_configuration_error() {
        let (_file, manager) = manager();
        manager.set_config_value(config_keys::TOP_N, "three").unwrap();

        let err = manager.load_analysis_config().unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Configuration(ConfigurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_cost_model_requires_every_key() {
        let (_file, manager) = manager();
        manager.set_config_value(config_keys::RESOURCE_ADD_COST, "45000").unwrap();

        match manager.load_cost_model() {
            Err(RepositoryError::Configuration(ConfigurationError::Missing { key })) => {
                assert_eq!(key, config_keys::QUALITY_PROGRAM_COST);
            }
            other => panic!("expected missing key, got {:?}", other),
        }

        seed_cost_model(&manager);
        let model = manager.load_cost_model().unwrap();
        assert_eq!(model.horizon_months, 12);
        assert_eq!(model.resource_add_cost, 45000.0);
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let (_file, manager) = manager();
        seed_cost_model(&manager);
        let snapshot = manager.get_config_snapshot().unwrap();

        let (_file2, other) = self::manager();
        let restored = other.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 5);
        assert_eq!(other.load_cost_model().unwrap(), manager.load_cost_model().unwrap());
    }

    #[test]
    fn test_json_layer_overrides_store() {
        let mut stored = ConfigLayer::new();
        stored.insert(config_keys::TOP_N.to_string(), "5".to_string());
        stored.insert(config_keys::DRIVER_WEIGHT.to_string(), "0.5".to_string());

        let file = parse_json_layer(r#"{"optimization.top_n": 2, "analysis.utilization_threshold": "0.9"}"#)
            .unwrap();

        let config = resolve_analysis_config(&[&stored, &file]).unwrap();
        assert_eq!(config.optimization.top_n, 2);
        assert_eq!(config.optimization.driver_weight, 0.5);
        assert_eq!(config.utilization_threshold, 0.9);
        assert!(!has_cost_model(&[&stored, &file]));
    }

    #[test]
    fn test_json_layer_rejects_non_object() {
        assert!(parse_json_layer("[1, 2]").is_err());
        assert!(parse_json_layer(r#"{"optimization.top_n": [1]}"#).is_err());
    }
}
