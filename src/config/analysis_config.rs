// ==========================================
// 制造运营雷达 - 分析配置
// ==========================================
// 职责: 分析阈值 / 优化模型参数 / 成本模型
// 红线: 配置显式传入各分析调用,不使用进程级可变状态
// ==========================================

use crate::config::config_manager::config_keys;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

// ==========================================
// AnalysisConfig - 诊断阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 平均等待 > 倍数 × 工序平均加工时间均值 时判定为瓶颈
    pub wait_threshold_multiplier: f64,
    /// WIP 占比达到该分位数 (默认上四分位) 判定为 WIP 瓶颈
    pub wip_bottleneck_quantile: f64,
    /// 工序 WIP > 倍数 × 工序平均 WIP 判定为堆积点
    pub wip_accumulation_multiplier: f64,
    /// 资源利用率超过该值判定为瓶颈
    pub utilization_threshold: f64,
    /// 利特尔法则相对偏差容忍度
    pub little_law_tolerance: f64,
    pub optimization: OptimizationConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wait_threshold_multiplier: 2.0,
            wip_bottleneck_quantile: 0.75,
            wip_accumulation_multiplier: 1.5,
            utilization_threshold: 0.80,
            little_law_tolerance: 0.10,
            optimization: OptimizationConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive(
            config_keys::WAIT_THRESHOLD_MULTIPLIER,
            self.wait_threshold_multiplier,
        )?;
        require_unit_interval(
            config_keys::WIP_BOTTLENECK_QUANTILE,
            self.wip_bottleneck_quantile,
        )?;
        require_positive(
            config_keys::WIP_ACCUMULATION_MULTIPLIER,
            self.wip_accumulation_multiplier,
        )?;
        require_positive(config_keys::UTILIZATION_THRESHOLD, self.utilization_threshold)?;
        require_positive(config_keys::LITTLE_LAW_TOLERANCE, self.little_law_tolerance)?;
        self.optimization.validate()
    }
}

// ==========================================
// OptimizationConfig - 优化模型参数
// ==========================================
// 弹性系数: 驱动因子每 1 个百分点对应的 WIP/交付周期改善百分点
// 复合衰减: 第 k 个动作 (从 0 计) 的增量乘以 1 / (1 + decay × k),
//           并作用在前序动作改善后的基线上
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// 返工率超过该值的工序成为候选
    pub rework_rate_threshold: f64,
    /// 等待/加工比达到该值 (或 unbounded) 视为产能不足
    pub capacity_ratio_threshold: f64,
    /// 输出的建议条数
    pub top_n: usize,
    pub resource_wip_elasticity: f64,
    pub resource_leadtime_elasticity: f64,
    pub quality_wip_elasticity: f64,
    pub quality_leadtime_elasticity: f64,
    pub composition_decay: f64,
    /// 排序分数 = driver_weight × 驱动因子 + roi_weight × roi/(1+roi)
    pub driver_weight: f64,
    pub roi_weight: f64,
    /// 分数 >= high_tier_score 为 HIGH
    pub high_tier_score: f64,
    /// 分数 >= medium_tier_score 为 MEDIUM,否则 LOW
    pub medium_tier_score: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            rework_rate_threshold: 0.10,
            capacity_ratio_threshold: 1.0,
            top_n: 3,
            resource_wip_elasticity: 0.6,
            resource_leadtime_elasticity: 0.4,
            quality_wip_elasticity: 0.8,
            quality_leadtime_elasticity: 0.6,
            composition_decay: 0.3,
            driver_weight: 0.6,
            roi_weight: 0.4,
            high_tier_score: 0.5,
            medium_tier_score: 0.25,
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_unit_interval(config_keys::REWORK_RATE_THRESHOLD, self.rework_rate_threshold)?;
        require_positive(config_keys::CAPACITY_RATIO_THRESHOLD, self.capacity_ratio_threshold)?;
        if self.top_n == 0 {
            return Err(ConfigurationError::invalid(
                config_keys::TOP_N,
                self.top_n,
                "必须大于 0",
            ));
        }
        for (key, value) in [
            (config_keys::RESOURCE_WIP_ELASTICITY, self.resource_wip_elasticity),
            (config_keys::RESOURCE_LEADTIME_ELASTICITY, self.resource_leadtime_elasticity),
            (config_keys::QUALITY_WIP_ELASTICITY, self.quality_wip_elasticity),
            (config_keys::QUALITY_LEADTIME_ELASTICITY, self.quality_leadtime_elasticity),
            (config_keys::COMPOSITION_DECAY, self.composition_decay),
            (config_keys::DRIVER_WEIGHT, self.driver_weight),
            (config_keys::ROI_WEIGHT, self.roi_weight),
        ] {
            require_non_negative(key, value)?;
        }
        if self.medium_tier_score > self.high_tier_score {
            return Err(ConfigurationError::invalid(
                config_keys::MEDIUM_TIER_SCORE,
                self.medium_tier_score,
                "不能高于 HIGH 档阈值",
            ));
        }
        Ok(())
    }
}

// ==========================================
// CostModel - 成本模型
// ==========================================
// 无缺省值: 任一参数缺失即为 ConfigurationError
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// 增加一份资源的成本
    pub resource_add_cost: f64,
    /// 单工序质量改进项目成本
    pub quality_program_cost_per_operation: f64,
    /// 年折现率 (按月折算)
    pub discount_rate: f64,
    /// 评估期 (月)
    pub horizon_months: u32,
    /// 每节约 1 小时交付周期的货币价值
    pub value_per_lead_time_hour: f64,
}

impl CostModel {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive(config_keys::RESOURCE_ADD_COST, self.resource_add_cost)?;
        require_positive(
            config_keys::QUALITY_PROGRAM_COST,
            self.quality_program_cost_per_operation,
        )?;
        require_non_negative(config_keys::DISCOUNT_RATE, self.discount_rate)?;
        if self.horizon_months == 0 {
            return Err(ConfigurationError::invalid(
                config_keys::HORIZON_MONTHS,
                self.horizon_months,
                "必须大于 0",
            ));
        }
        require_non_negative(config_keys::VALUE_PER_LEAD_TIME_HOUR, self.value_per_lead_time_hour)
    }

    /// 月折现率
    pub fn monthly_discount_rate(&self) -> f64 {
        self.discount_rate / 12.0
    }

    /// 评估期内每月 1 单位节约的折现总值
    pub fn annuity_factor(&self) -> f64 {
        let r = self.monthly_discount_rate();
        if r == 0.0 {
            return self.horizon_months as f64;
        }
        (1..=self.horizon_months)
            .map(|m| 1.0 / (1.0 + r).powi(m as i32))
            .sum()
    }
}

// ==========================================
// 校验辅助函数
// ==========================================

fn require_positive(key: &str, value: f64) -> Result<(), ConfigurationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigurationError::invalid(key, value, "必须为正的有限数"));
    }
    Ok(())
}

fn require_non_negative(key: &str, value: f64) -> Result<(), ConfigurationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigurationError::invalid(key, value, "必须为非负的有限数"));
    }
    Ok(())
}

fn require_unit_interval(key: &str, value: f64) -> Result<(), ConfigurationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigurationError::invalid(key, value, "必须位于 [0, 1]"));
    }
    Ok(())
}
