// ==========================================
// 制造运营雷达 - 优化建议引擎
// ==========================================
// 职责: 候选工序识别 / 动作分类 / 影响与成本估算 / 排序分档
//       综合影响 (递减收益复合)
// 输入: 瓶颈排名 + WIP 排名 + 返工记录 + WIP 报告 + 流程模型 + 成本模型
// 红线: 成本模型缺失或非法时为 ConfigurationError;上游诊断不受影响
// ==========================================

use crate::config::{CostModel, OptimizationConfig};
use crate::domain::bottleneck::{BottleneckRecord, WipBottleneckRecord};
use crate::domain::process::ProcessModel;
use crate::domain::recommendation::{ImpactSummary, RecommendationRecord};
use crate::domain::rework::ReworkReport;
use crate::domain::types::{ActionType, PriorityTier, Ratio};
use crate::domain::wip::WipReport;
use crate::error::ConfigurationError;
use tracing::{debug, info};

/// 月均天数 (吞吐率换算)
pub const DAYS_PER_MONTH: f64 = 30.4;

/// 优化引擎输入 (均为只读引用)
#[derive(Debug, Clone, Copy)]
pub struct OptimizationInput<'a> {
    pub process: &'a ProcessModel,
    pub bottlenecks: &'a [BottleneckRecord],
    pub wip_bottlenecks: &'a [WipBottleneckRecord],
    pub wip: &'a WipReport,
    pub rework: &'a ReworkReport,
}

/// 优化结果
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    pub recommendations: Vec<RecommendationRecord>,
    pub impact: ImpactSummary,
}

// 候选工序的驱动信号
struct Candidate<'a> {
    operation: &'a str,
    position: u32,
    wait_share: f64,
    wait_cycle_ratio: Ratio,
    wip_share: f64,
    rework_rate: Ratio,
}

// ==========================================
// OptimizationEngine - 优化建议引擎
// ==========================================
pub struct OptimizationEngine {
    config: OptimizationConfig,
    cost_model: CostModel,
}

impl OptimizationEngine {
    /// 创建引擎 (校验参数)
    pub fn new(config: OptimizationConfig, cost_model: CostModel) -> Result<Self, ConfigurationError> {
        config.validate()?;
        cost_model.validate()?;
        Ok(Self { config, cost_model })
    }

    /// 生成排序后的前 N 条建议与综合影响
    pub fn recommend(&self, input: OptimizationInput<'_>) -> OptimizationOutcome {
        let baseline_lead_time = input.process.lead_time_mean_hours();
        let pieces_per_month = input
            .process
            .overview
            .throughput_per_day
            .defined_or(0.0)
            * DAYS_PER_MONTH;

        let mut recommendations: Vec<(u32, RecommendationRecord)> = self
            .candidates(&input)
            .iter()
            .filter_map(|c| {
                self.evaluate(c, baseline_lead_time, pieces_per_month)
                    .map(|record| (c.position, record))
            })
            .collect();

        sort_by_priority(&mut recommendations);

        let candidate_count = recommendations.len();
        let recommendations: Vec<RecommendationRecord> = recommendations
            .into_iter()
            .take(self.config.top_n)
            .enumerate()
            .map(|(idx, (_, mut record))| {
                record.rank = idx + 1;
                record
            })
            .collect();

        let impact = self.compose_impact(
            &recommendations,
            input.wip.global.wip_mean,
            baseline_lead_time,
            pieces_per_month,
        );

        info!(
            candidates = candidate_count,
            selected = recommendations.len(),
            delta_wip_pct = impact.delta_wip_pct,
            delta_leadtime_pct = impact.delta_leadtime_pct,
            total_cost = impact.total_cost,
            blended_roi = %impact.blended_roi,
            "优化建议生成完成"
        );

        OptimizationOutcome {
            recommendations,
            impact,
        }
    }

    // ==========================================
    // 候选识别
    // ==========================================

    /// 等待瓶颈 / WIP 瓶颈 / 返工率超阈值的工序 (按标准位置)
    fn candidates<'a>(&self, input: &OptimizationInput<'a>) -> Vec<Candidate<'a>> {
        let mut candidates = Vec::new();

        for record in input.rework.records.iter() {
            let bottleneck = input
                .bottlenecks
                .iter()
                .find(|b| b.operation == record.operation);
            let wip = input
                .wip_bottlenecks
                .iter()
                .find(|w| w.operation == record.operation);

            let wait_flagged = bottleneck.map_or(false, |b| b.is_bottleneck);
            let wip_flagged = wip.map_or(false, |w| w.is_bottleneck);
            let rework_flagged = matches!(
                record.rate.value(),
                Some(rate) if rate > self.config.rework_rate_threshold
            );

            if !(wait_flagged || wip_flagged || rework_flagged) {
                continue;
            }

            candidates.push(Candidate {
                operation: record.operation.as_str(),
                position: record.position,
                wait_share: bottleneck.map_or(0.0, |b| b.pct_of_total_wait.defined_or(0.0) / 100.0),
                wait_cycle_ratio: bottleneck.map_or(Ratio::Undefined, |b| b.wait_cycle_ratio),
                wip_share: wip.map_or(0.0, |w| w.share_of_total_wip.defined_or(0.0) / 100.0),
                rework_rate: record.rate,
            });
        }

        debug!(candidates = candidates.len(), "候选工序识别完成");
        candidates
    }

    // ==========================================
    // 单动作评估
    // ==========================================

    /// 动作分类
    ///
    /// - 返工率超阈值,且不低于等待占比或产能信号不足: 质量标准化
    /// - 等待/加工比达到 capacity_ratio_threshold (unbounded 视为达到): 增加资源
    /// - 其余: 无匹配动作
    pub fn classify(&self, wait_share: f64, wait_cycle_ratio: Ratio, rework_rate: Ratio) -> Option<ActionType> {
        let capacity_bound = match wait_cycle_ratio {
            Ratio::Defined(ratio) => ratio >= self.config.capacity_ratio_threshold,
            Ratio::Unbounded => true,
            Ratio::Undefined => false,
        };
        let rework_flagged = matches!(
            rework_rate.value(),
            Some(rate) if rate > self.config.rework_rate_threshold
        );

        if rework_flagged && (!capacity_bound || rework_rate.defined_or(0.0) >= wait_share) {
            Some(ActionType::StandardizeQuality)
        } else if capacity_bound {
            Some(ActionType::AddResource)
        } else {
            None
        }
    }

    fn evaluate(
        &self,
        candidate: &Candidate<'_>,
        baseline_lead_time: f64,
        pieces_per_month: f64,
    ) -> Option<RecommendationRecord> {
        let Some(action_type) =
            self.classify(candidate.wait_share, candidate.wait_cycle_ratio, candidate.rework_rate)
        else {
            debug!(operation = candidate.operation, "无匹配动作,跳过候选");
            return None;
        };

        let (driver, wip_elasticity, lt_elasticity, cost) = match action_type {
            ActionType::StandardizeQuality => (
                candidate.rework_rate.defined_or(0.0),
                self.config.quality_wip_elasticity,
                self.config.quality_leadtime_elasticity,
                self.cost_model.quality_program_cost_per_operation,
            ),
            ActionType::AddResource => (
                // 无等待占比时退回 WIP 占比
                if candidate.wait_share > 0.0 {
                    candidate.wait_share
                } else {
                    candidate.wip_share
                },
                self.config.resource_wip_elasticity,
                self.config.resource_leadtime_elasticity,
                self.cost_model.resource_add_cost,
            ),
        };

        let delta_wip_pct = displacement(wip_elasticity, driver);
        let delta_leadtime_pct = displacement(lt_elasticity, driver);
        let monthly_savings =
            self.monthly_savings(baseline_lead_time, delta_leadtime_pct, pieces_per_month);
        let roi = Ratio::of(monthly_savings * self.cost_model.horizon_months as f64, cost);
        let payback_months = Ratio::of(cost, monthly_savings);
        let npv = monthly_savings * self.cost_model.annuity_factor() - cost;

        let priority_score = self.score(driver, roi);
        let priority = self.tier(priority_score);

        let rationale = match action_type {
            ActionType::AddResource => format!(
                "{} 等待占比 {:.1}%,等待/加工比 {},WIP 占比 {:.1}%: 增加资源",
                candidate.operation,
                candidate.wait_share * 100.0,
                candidate.wait_cycle_ratio,
                candidate.wip_share * 100.0
            ),
            ActionType::StandardizeQuality => format!(
                "{} 返工率 {:.1}% 超过阈值 {:.1}%: 质量标准化",
                candidate.operation,
                driver * 100.0,
                self.config.rework_rate_threshold * 100.0
            ),
        };

        Some(RecommendationRecord {
            rank: 0,
            action_type,
            target: candidate.operation.to_string(),
            priority,
            priority_score,
            driver: Ratio::Defined(driver),
            cost,
            delta_wip_pct,
            delta_leadtime_pct,
            monthly_savings,
            roi,
            payback_months,
            npv,
            rationale,
        })
    }

    /// 月节约 = 基线交付周期 × 交付周期改善比例 × 月产量 × 每小时价值
    fn monthly_savings(&self, baseline_lead_time: f64, delta_leadtime_pct: f64, pieces_per_month: f64) -> f64 {
        baseline_lead_time
            * (delta_leadtime_pct.abs() / 100.0)
            * pieces_per_month
            * self.cost_model.value_per_lead_time_hour
    }

    /// 排序分数 = driver_weight × 驱动因子 + roi_weight × roi/(1+roi)
    pub fn score(&self, driver: f64, roi: Ratio) -> f64 {
        let roi_term = match roi {
            Ratio::Defined(r) if r > 0.0 => r / (1.0 + r),
            Ratio::Unbounded => 1.0,
            _ => 0.0,
        };
        self.config.driver_weight * driver + self.config.roi_weight * roi_term
    }

    pub fn tier(&self, score: f64) -> PriorityTier {
        if score >= self.config.high_tier_score {
            PriorityTier::High
        } else if score >= self.config.medium_tier_score {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    // ==========================================
    // 综合影响
    // ==========================================

    /// 按排名顺序复合: 第 k 个动作的增量乘以 1/(1 + decay × k),
    /// 并作用在前序动作改善后的基线上
    fn compose_impact(
        &self,
        recommendations: &[RecommendationRecord],
        baseline_wip_mean: Ratio,
        baseline_lead_time: f64,
        pieces_per_month: f64,
    ) -> ImpactSummary {
        let wip_deltas: Vec<f64> = recommendations.iter().map(|r| r.delta_wip_pct).collect();
        let lt_deltas: Vec<f64> = recommendations.iter().map(|r| r.delta_leadtime_pct).collect();

        let delta_wip_pct = self.compose(&wip_deltas);
        let delta_leadtime_pct = self.compose(&lt_deltas);
        let total_cost: f64 = recommendations.iter().map(|r| r.cost).sum();

        let blended_savings =
            self.monthly_savings(baseline_lead_time, delta_leadtime_pct, pieces_per_month);
        let blended_roi = Ratio::of(
            blended_savings * self.cost_model.horizon_months as f64,
            total_cost,
        );

        ImpactSummary {
            action_count: recommendations.len(),
            delta_wip_pct,
            delta_leadtime_pct,
            naive_delta_wip_pct: wip_deltas.iter().sum(),
            naive_delta_leadtime_pct: lt_deltas.iter().sum(),
            total_cost,
            blended_roi,
            baseline_wip_mean,
            projected_wip_mean: baseline_wip_mean.map(|w| w * (1.0 + delta_wip_pct / 100.0)),
            baseline_lead_time_hours: baseline_lead_time,
            projected_lead_time_hours: baseline_lead_time * (1.0 + delta_leadtime_pct / 100.0),
        }
    }

    /// 递减收益复合,返回百分比增量
    pub fn compose(&self, deltas_pct: &[f64]) -> f64 {
        let remaining = deltas_pct.iter().enumerate().fold(1.0, |acc, (k, delta)| {
            let attenuation = 1.0 / (1.0 + self.config.composition_decay * k as f64);
            acc * (1.0 + delta / 100.0 * attenuation)
        });
        (remaining - 1.0) * 100.0
    }
}

/// 排序: 分数降序,成本升序,标准位置升序,动作类型
fn sort_by_priority(recommendations: &mut [(u32, RecommendationRecord)]) {
    recommendations.sort_by(|(pa, a), (pb, b)| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.cost.total_cmp(&b.cost))
            .then_with(|| pa.cmp(pb))
            .then_with(|| a.action_type.cmp(&b.action_type))
    });
}

/// 线性位移模型: -弹性 × 驱动因子 (百分比,截断到 [-100, 0])
fn displacement(elasticity: f64, driver: f64) -> f64 {
    (-(elasticity * driver * 100.0)).clamp(-100.0, 0.0)
}
