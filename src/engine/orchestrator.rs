// ==========================================
// 制造运营雷达 - 分析编排器
// ==========================================
// 主流程:
// EventLog → 流程挖掘 → {瓶颈识别, WIP 分析, 返工追踪} → 优化建议 → 结果包
// 并发: 三个中间分析器互不依赖,可在阻塞线程池并行执行,优化引擎为汇合点
// 红线: 配置显式传入,无共享可变状态
// ==========================================

use crate::config::{AnalysisConfig, CostModel};
use crate::domain::bottleneck::{BottleneckRecord, ResourceUtilization};
use crate::domain::bundle::{DataQualityWarning, Diagnostics, KpiSummary, ResultBundle};
use crate::domain::event::EventLog;
use crate::domain::process::ProcessModel;
use crate::domain::rework::ReworkReport;
use crate::domain::wip::WipReport;
use crate::engine::bottleneck::BottleneckDetector;
use crate::engine::optimization::{OptimizationEngine, OptimizationInput, OptimizationOutcome};
use crate::engine::process_mining::ProcessMiningEngine;
use crate::engine::rework::ReworkTracker;
use crate::engine::wip::WipAnalyzer;
use crate::error::{AnalysisError, AnalysisResult, ConfigurationError};
use std::sync::Arc;
use tracing::{debug, info};

/// 标准流程中存在未被访问的工序
pub const UNVISITED_OPERATION_WARNING: &str = "UNVISITED_OPERATION";
/// 观察期长度为 0,吞吐率与 WIP 均值不可定义
pub const ZERO_HORIZON_WARNING: &str = "ZERO_HORIZON";

// ==========================================
// AnalysisOrchestrator - 分析编排器
// ==========================================
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    cost_model: Option<CostModel>,
}

impl AnalysisOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - config: 分析配置
    /// - cost_model: 成本模型;为 None 时仅能运行诊断
    pub fn new(config: AnalysisConfig, cost_model: Option<CostModel>) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config, cost_model })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    // ==========================================
    // 顺序执行
    // ==========================================

    /// 诊断 (不需要成本模型)
    pub fn run_diagnostics(&self, log: &EventLog) -> Diagnostics {
        info!(log_version = %log.version_id(), events = log.event_count(), "开始诊断分析");

        let process = ProcessMiningEngine::new().analyze(log);
        let (bottlenecks, resource_utilization) = self.detect_bottlenecks(log, &process);
        let wip = WipAnalyzer::new(&self.config).analyze(log, &process);
        let rework = ReworkTracker::new().analyze(log, &process);

        self.assemble_diagnostics(log, process, bottlenecks, resource_utilization, wip, rework)
    }

    /// 完整流程 (需要成本模型)
    pub fn run(&self, log: &EventLog) -> AnalysisResult<ResultBundle> {
        let engine = self.optimization_engine()?;
        let diagnostics = self.run_diagnostics(log);
        let outcome = Self::optimize(&engine, &diagnostics);
        Ok(Self::bundle(diagnostics, outcome))
    }

    /// 在已有诊断结果上生成建议
    pub fn recommend(&self, diagnostics: &Diagnostics) -> AnalysisResult<OptimizationOutcome> {
        let engine = self.optimization_engine()?;
        Ok(Self::optimize(&engine, diagnostics))
    }

    // ==========================================
    // 并发执行
    // ==========================================

    /// 并发诊断: 瓶颈识别 / WIP 分析 / 返工追踪在阻塞线程池并行
    pub async fn run_diagnostics_concurrent(&self, log: Arc<EventLog>) -> AnalysisResult<Diagnostics> {
        let process = {
            let log = Arc::clone(&log);
            tokio::task::spawn_blocking(move || ProcessMiningEngine::new().analyze(&log))
                .await
                .map_err(|e| AnalysisError::TaskFailed(format!("流程挖掘: {}", e)))?
        };
        let process = Arc::new(process);

        let bottleneck_task = {
            let (log, process, this) = (Arc::clone(&log), Arc::clone(&process), self.clone());
            tokio::task::spawn_blocking(move || this.detect_bottlenecks(&log, &process))
        };
        let wip_task = {
            let (log, process, config) = (Arc::clone(&log), Arc::clone(&process), self.config.clone());
            tokio::task::spawn_blocking(move || WipAnalyzer::new(&config).analyze(&log, &process))
        };
        let rework_task = {
            let (log, process) = (Arc::clone(&log), Arc::clone(&process));
            tokio::task::spawn_blocking(move || ReworkTracker::new().analyze(&log, &process))
        };

        let ((bottlenecks, resource_utilization), wip, rework) =
            tokio::try_join!(bottleneck_task, wip_task, rework_task)
                .map_err(|e| AnalysisError::TaskFailed(e.to_string()))?;
        debug!("并发分析任务已汇合");

        let process = Arc::try_unwrap(process).unwrap_or_else(|shared| (*shared).clone());
        Ok(self.assemble_diagnostics(&log, process, bottlenecks, resource_utilization, wip, rework))
    }

    /// 并发完整流程,结果与顺序执行一致
    pub async fn run_concurrent(&self, log: Arc<EventLog>) -> AnalysisResult<ResultBundle> {
        let engine = self.optimization_engine()?;
        let diagnostics = self.run_diagnostics_concurrent(log).await?;
        let outcome = Self::optimize(&engine, &diagnostics);
        Ok(Self::bundle(diagnostics, outcome))
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    fn optimization_engine(&self) -> Result<OptimizationEngine, ConfigurationError> {
        let cost_model = self.cost_model.clone().ok_or_else(|| ConfigurationError::Missing {
            key: "cost_model".to_string(),
        })?;
        OptimizationEngine::new(self.config.optimization.clone(), cost_model)
    }

    fn detect_bottlenecks(
        &self,
        log: &EventLog,
        process: &ProcessModel,
    ) -> (Vec<BottleneckRecord>, Vec<ResourceUtilization>) {
        let detector = BottleneckDetector::new(&self.config);
        (detector.rank_by_wait(process), detector.resource_utilization(log))
    }

    fn assemble_diagnostics(
        &self,
        log: &EventLog,
        process: ProcessModel,
        bottlenecks: Vec<BottleneckRecord>,
        resource_utilization: Vec<ResourceUtilization>,
        wip: WipReport,
        rework: ReworkReport,
    ) -> Diagnostics {
        // WIP 排名依赖 WIP 报告,在汇合后计算
        let wip_bottlenecks = BottleneckDetector::new(&self.config).rank_by_wip(&wip);

        let kpis = KpiSummary {
            lead_time_mean_hours: process.lead_time_mean_hours(),
            wip_mean: wip.global.wip_mean,
            throughput_per_day: process.overview.throughput_per_day,
            rework_rate_global: rework.global_rework_rate,
            flow_efficiency: wip.flow_efficiency.flow_efficiency,
        };

        let warnings = self.collect_warnings(log, &wip, &rework);

        info!(
            log_version = %log.version_id(),
            lead_time_mean_hours = kpis.lead_time_mean_hours,
            wip_mean = %kpis.wip_mean,
            throughput_per_day = %kpis.throughput_per_day,
            rework_rate_global = %kpis.rework_rate_global,
            flow_efficiency = %kpis.flow_efficiency,
            warnings = warnings.len(),
            "诊断分析完成"
        );

        Diagnostics {
            log_version: log.version_id().to_string(),
            kpis,
            process,
            bottlenecks,
            wip_bottlenecks,
            resource_utilization,
            wip,
            rework,
            warnings,
        }
    }

    fn collect_warnings(
        &self,
        log: &EventLog,
        wip: &WipReport,
        rework: &ReworkReport,
    ) -> Vec<DataQualityWarning> {
        let mut warnings = Vec::new();

        if log.horizon_hours() <= 0.0 {
            warnings.push(DataQualityWarning::new(
                ZERO_HORIZON_WARNING,
                "观察期长度为 0,吞吐率、平均 WIP 与流动效率不可定义".to_string(),
            ));
        }

        let unvisited: Vec<&str> = rework
            .records
            .iter()
            .filter(|r| r.total_count == 0)
            .map(|r| r.operation.as_str())
            .collect();
        if !unvisited.is_empty() {
            warnings.push(DataQualityWarning::new(
                UNVISITED_OPERATION_WARNING,
                format!("标准流程中未被访问的工序: {}", unvisited.join(", ")),
            ));
        }

        if let Some(warning) = WipAnalyzer::new(&self.config).little_law_warning(&wip.little_law) {
            warnings.push(warning);
        }

        warnings
    }

    fn optimize(engine: &OptimizationEngine, diagnostics: &Diagnostics) -> OptimizationOutcome {
        engine.recommend(OptimizationInput {
            process: &diagnostics.process,
            bottlenecks: &diagnostics.bottlenecks,
            wip_bottlenecks: &diagnostics.wip_bottlenecks,
            wip: &diagnostics.wip,
            rework: &diagnostics.rework,
        })
    }

    fn bundle(diagnostics: Diagnostics, outcome: OptimizationOutcome) -> ResultBundle {
        ResultBundle {
            log_version: diagnostics.log_version,
            kpis: diagnostics.kpis,
            bottlenecks: diagnostics.bottlenecks,
            recommendations: outcome.recommendations,
            impact: outcome.impact,
            warnings: diagnostics.warnings,
        }
    }
}
