// ==========================================
// 仓储与配置集成测试
// ==========================================
// 测试目标: 分析结果持久化 / config_kv 分层配置驱动分析
// ==========================================

mod helpers;

use helpers::event_log_builder::*;
use ops_radar::config::{
    config_keys, has_cost_model, parse_json_layer, resolve_analysis_config, resolve_cost_model,
    AnalysisConfig, ConfigLayer, ConfigManager,
};
use ops_radar::domain::EventLog;
use ops_radar::engine::AnalysisOrchestrator;
use ops_radar::repository::{AnalysisRunRepository, RepositoryError};
use test_helpers::{create_test_db, shared_connection};

fn scenario_a_bundle() -> (EventLog, ops_radar::domain::ResultBundle) {
    let log = EventLog::from_events(scenario_a_events()).unwrap();
    let bundle = AnalysisOrchestrator::new(AnalysisConfig::default(), Some(cost_model()))
        .unwrap()
        .run(&log)
        .unwrap();
    (log, bundle)
}

// ==========================================
// 分析结果仓储
// ==========================================

#[test]
fn test_save_and_load_bundle() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = AnalysisRunRepository::new(&db_path).unwrap();
    let (log, bundle) = scenario_a_bundle();

    let run_id = repo
        .save_bundle(&bundle, log.piece_count(), log.event_count())
        .unwrap();

    let entity = repo.find_by_log_version(log.version_id()).unwrap().unwrap();
    assert_eq!(entity.run_id, run_id);
    assert_eq!(entity.piece_count, 150);
    assert_eq!(entity.event_count, 1298);
    assert_eq!(entity.recommendation_count, bundle.recommendations.len());

    let loaded = repo.load_bundle(log.version_id()).unwrap();
    assert_eq!(loaded.log_version, bundle.log_version);
    let targets: Vec<&str> = loaded.recommendations.iter().map(|r| r.target.as_str()).collect();
    let expected: Vec<&str> = bundle.recommendations.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(targets, expected);
}

#[test]
fn test_resave_same_version_keeps_run_id() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = AnalysisRunRepository::new(&db_path).unwrap();
    let (log, bundle) = scenario_a_bundle();

    let first = repo.save_bundle(&bundle, 150, 1298).unwrap();
    let second = repo.save_bundle(&bundle, 150, 1298).unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.list_runs().unwrap().len(), 1);

    assert_eq!(repo.delete_by_log_version(log.version_id()).unwrap(), 1);
    assert!(repo.find_by_log_version(log.version_id()).unwrap().is_none());
}

#[test]
fn test_load_missing_bundle_is_not_found() {
    let (_temp, db_path) = create_test_db().unwrap();
    let repo = AnalysisRunRepository::new(&db_path).unwrap();

    assert!(matches!(
        repo.load_bundle("no-such-version"),
        Err(RepositoryError::NotFound { .. })
    ));
}

// ==========================================
// 分层配置
// ==========================================

#[test]
fn test_config_layers_drive_analysis() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let manager = ConfigManager::from_connection(conn.clone()).unwrap();

    manager.set_config_value(config_keys::TOP_N, "1").unwrap();
    manager.set_config_value(config_keys::RESOURCE_ADD_COST, "45000").unwrap();
    manager.set_config_value(config_keys::QUALITY_PROGRAM_COST, "15000").unwrap();
    manager.set_config_value(config_keys::DISCOUNT_RATE, "0.08").unwrap();
    manager.set_config_value(config_keys::HORIZON_MONTHS, "12").unwrap();
    manager.set_config_value(config_keys::VALUE_PER_LEAD_TIME_HOUR, "40").unwrap();

    let db_layer = manager.load_layer().unwrap();
    // 文件层覆盖数据库层
    let file_layer = parse_json_layer(r#"{"optimization.top_n": 2}"#).unwrap();
    let layers: Vec<&ConfigLayer> = vec![&db_layer, &file_layer];

    let config = resolve_analysis_config(&layers).unwrap();
    assert_eq!(config.optimization.top_n, 2);
    assert!(has_cost_model(&layers));
    let cost_model = resolve_cost_model(&layers).unwrap();
    assert_eq!(cost_model, helpers::event_log_builder::cost_model());

    let log = EventLog::from_events(scenario_a_events()).unwrap();
    let bundle = AnalysisOrchestrator::new(config, Some(cost_model))
        .unwrap()
        .run(&log)
        .unwrap();
    assert_eq!(bundle.recommendations.len(), 2);

    // 同一连接上保存结果
    let repo = AnalysisRunRepository::from_connection(conn);
    repo.save_bundle(&bundle, log.piece_count(), log.event_count())
        .unwrap();
    assert_eq!(repo.list_runs().unwrap().len(), 1);
}

#[test]
fn test_config_snapshot_roundtrip() {
    let (_temp, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();

    manager
        .set_config_value(config_keys::WAIT_THRESHOLD_MULTIPLIER, "3.0")
        .unwrap();
    let snapshot = manager.get_config_snapshot().unwrap();

    manager
        .set_config_value(config_keys::WAIT_THRESHOLD_MULTIPLIER, "1.5")
        .unwrap();
    manager.restore_config_from_snapshot(&snapshot).unwrap();

    let config = manager.load_analysis_config().unwrap();
    assert_eq!(config.wait_threshold_multiplier, 3.0);
}
