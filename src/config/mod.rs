// ==========================================
// 制造运营雷达 - 配置层
// ==========================================
// 职责: 分析阈值/优化参数/成本模型,支持多级覆写
// 存储: config_kv 表 + JSON 覆写文件
// ==========================================

pub mod analysis_config;
pub mod config_manager;

// 重导出核心配置
pub use analysis_config::{AnalysisConfig, CostModel, OptimizationConfig};
pub use config_manager::{
    config_keys, has_cost_model, parse_json_layer, resolve_analysis_config, resolve_cost_model,
    ConfigLayer, ConfigManager,
};
