// ==========================================
// 制造运营雷达 - 命令行入口
// ==========================================
// 用法:
//   ops-radar --event-log events.csv [--config radar.json] [--db radar.db] [--out bundle.json]
// 配置分层: 内置默认值 < 数据库 config_kv < JSON 配置文件
// ==========================================

use anyhow::{bail, Context};
use clap::Parser;
use ops_radar::config::{
    has_cost_model, parse_json_layer, resolve_analysis_config, resolve_cost_model, ConfigLayer,
    ConfigManager,
};
use ops_radar::db::open_sqlite_connection;
use ops_radar::domain::{CanonicalFlow, Operation};
use ops_radar::engine::AnalysisOrchestrator;
use ops_radar::importer::CsvEventLogReader;
use ops_radar::repository::AnalysisRunRepository;
use ops_radar::logging::{self, LogFormat};
use ops_radar::{APP_NAME, VERSION};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "ops-radar", version, about = "制造运营雷达 - 事件日志诊断与改进建议")]
struct Cli {
    /// 事件日志 CSV 路径
    #[arg(long)]
    event_log: PathBuf,

    /// JSON 配置文件 (扁平键值,键名同 config_kv)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite 数据库路径 (读取 config_kv,保存分析结果)
    #[arg(long)]
    db: Option<String>,

    /// 结果输出路径,缺省写到标准输出
    #[arg(long)]
    out: Option<PathBuf>,

    /// 标准工序流程,逗号分隔,按位置排列;缺省从日志推导
    #[arg(long, value_delimiter = ',')]
    flow: Vec<String>,

    /// 仅输出诊断集合,不生成建议
    #[arg(long)]
    diagnostics_only: bool,

    /// 日志格式
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);
    info!(version = VERSION, "{} 启动", APP_NAME);

    // 仓储共用同一连接
    let conn = match &cli.db {
        Some(path) => Some(Arc::new(Mutex::new(
            open_sqlite_connection(path).with_context(|| format!("无法打开数据库: {}", path))?,
        ))),
        None => None,
    };

    // 1. 配置分层
    let mut layers: Vec<ConfigLayer> = Vec::new();
    if let Some(conn) = &conn {
        let manager = ConfigManager::from_connection(Arc::clone(conn))?;
        layers.push(manager.load_layer()?);
    }
    if let Some(path) = &cli.config {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        layers.push(parse_json_layer(&raw)?);
    }
    let layer_refs: Vec<&ConfigLayer> = layers.iter().collect();
    let config = resolve_analysis_config(&layer_refs)?;
    let cost_model = if has_cost_model(&layer_refs) {
        Some(resolve_cost_model(&layer_refs)?)
    } else {
        None
    };

    if cost_model.is_none() && !cli.diagnostics_only {
        bail!("未配置成本模型 (cost_model.*),无法生成建议;如仅需诊断请使用 --diagnostics-only");
    }

    // 2. 读取事件日志
    let reader = if cli.flow.is_empty() {
        CsvEventLogReader::new()
    } else {
        let operations = cli
            .flow
            .iter()
            .enumerate()
            .map(|(idx, name)| Operation::new(name.trim(), idx as u32 + 1))
            .collect();
        CsvEventLogReader::with_flow(CanonicalFlow::from_operations(operations)?)
    };
    let log = Arc::new(reader.read_path(&cli.event_log)?);

    // 3. 分析
    let orchestrator = AnalysisOrchestrator::new(config, cost_model)?;
    let output = if cli.diagnostics_only {
        let diagnostics = orchestrator.run_diagnostics_concurrent(Arc::clone(&log)).await?;
        for warning in &diagnostics.warnings {
            warn!(code = %warning.code, "{}", warning.message);
        }
        serde_json::to_string_pretty(&diagnostics)?
    } else {
        let bundle = orchestrator.run_concurrent(Arc::clone(&log)).await?;
        for warning in &bundle.warnings {
            warn!(code = %warning.code, "{}", warning.message);
        }
        for rec in &bundle.recommendations {
            info!(
                rank = rec.rank,
                target = %rec.target,
                action_type = ?rec.action_type,
                priority_score = rec.priority_score,
                "改进建议"
            );
        }

        // 4. 持久化
        if let Some(conn) = &conn {
            let repo = AnalysisRunRepository::from_connection(Arc::clone(conn));
            let run_id = repo.save_bundle(&bundle, log.piece_count(), log.event_count())?;
            info!(run_id = %run_id, "分析结果已保存");
        }
        bundle.to_json_pretty()?
    };

    // 5. 输出
    match &cli.out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("无法写入结果: {}", path.display()))?;
            info!(path = %path.display(), "结果已写出");
        }
        None => println!("{}", output),
    }

    Ok(())
}
