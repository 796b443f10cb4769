// ==========================================
// 并发分析测试
// ==========================================
// 测试目标: 并发执行与顺序执行结果一致,多快照并行互不干扰
// ==========================================

mod helpers;

use helpers::event_log_builder::*;
use ops_radar::config::AnalysisConfig;
use ops_radar::domain::EventLog;
use ops_radar::engine::AnalysisOrchestrator;
use std::sync::Arc;

fn orchestrator() -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(AnalysisConfig::default(), Some(cost_model())).unwrap()
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential() {
    let log = Arc::new(EventLog::from_events(scenario_a_events()).unwrap());

    let sequential = orchestrator().run(&log).unwrap();
    let concurrent = orchestrator().run_concurrent(Arc::clone(&log)).await.unwrap();

    assert_eq!(
        sequential.to_json_pretty().unwrap(),
        concurrent.to_json_pretty().unwrap()
    );
}

#[tokio::test]
async fn test_concurrent_diagnostics_match_sequential() {
    let log = Arc::new(EventLog::from_events(scenario_a_events()).unwrap());

    let sequential = orchestrator().run_diagnostics(&log);
    let concurrent = orchestrator()
        .run_diagnostics_concurrent(Arc::clone(&log))
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_independent_snapshots_in_parallel() {
    let logs = vec![
        Arc::new(EventLog::from_events(scenario_a_events()).unwrap()),
        Arc::new(EventLog::from_events(contiguous_events(4)).unwrap()),
        Arc::new(EventLog::from_events(contiguous_events(10)).unwrap()),
    ];

    let handles: Vec<_> = logs
        .iter()
        .map(|log| {
            let log = Arc::clone(log);
            tokio::spawn(async move { orchestrator().run_concurrent(log).await })
        })
        .collect();

    for (handle, log) in handles.into_iter().zip(&logs) {
        let bundle = handle.await.unwrap().unwrap();
        assert_eq!(bundle.log_version, log.version_id());
        assert_eq!(bundle, orchestrator().run(log).unwrap());
    }
}
