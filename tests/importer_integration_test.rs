// ==========================================
// 事件日志导入集成测试
// ==========================================
// 测试目标: CSV 文件 → EventLog → 诊断,与内存构建结果一致
// ==========================================

mod helpers;

use helpers::event_log_builder::*;
use ops_radar::config::AnalysisConfig;
use ops_radar::domain::EventLog;
use ops_radar::engine::AnalysisOrchestrator;
use ops_radar::error::DataIntegrityError;
use ops_radar::importer::{CsvEventLogReader, ImportError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_csv_file_matches_in_memory_log() {
    let events = scenario_a_events();
    let expected = EventLog::from_events(events.clone()).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("events.csv");
    fs::write(&path, events_to_csv(&events)).unwrap();

    let imported = CsvEventLogReader::new().read_path(&path).unwrap();

    assert_eq!(imported.event_count(), 1298);
    assert_eq!(imported.piece_count(), 150);
    assert_eq!(imported.version_id(), expected.version_id());

    let orchestrator =
        AnalysisOrchestrator::new(AnalysisConfig::default(), Some(cost_model())).unwrap();
    let from_file = orchestrator.run(&imported).unwrap().to_json_pretty().unwrap();
    let from_memory = orchestrator.run(&expected).unwrap().to_json_pretty().unwrap();
    assert_eq!(from_file, from_memory);
}

#[test]
fn test_explicit_sequence_index_column() {
    let csv = "\
piece_id,operation_name,operation_sequence,resource_id,resource_qualification,start_time,end_time,duration_hours,status,rework_of,quality_check_passed,defect_code,cost,value_add,source_system,batch_id,sequence_index
P1,WELD,2,R-2,L2,2023-09-01 10:00:00,2023-09-01 11:00:00,1.0,normal,,false,D-01,40,true,MES,B001,20
P1,CUT,1,R-1,L2,2023-09-01 08:00:00,2023-09-01 09:00:00,1.0,normal,,true,,40,true,MES,B001,10
P1,WELD,2,R-2,L2,2023-09-01 11:00:00,2023-09-01 12:00:00,1.0,rework,20,true,,40,false,MES,B001,30
";
    let log = CsvEventLogReader::new().read_str(csv).unwrap();
    let trace = &log.traces()[0];

    let steps: Vec<(u32, &str)> = trace
        .events
        .iter()
        .map(|e| (e.sequence_index, e.operation_name.as_str()))
        .collect();
    assert_eq!(steps, vec![(10, "CUT"), (20, "WELD"), (30, "WELD")]);
    assert_eq!(trace.events[2].rework_of, Some(20));
}

#[test]
fn test_malformed_row_is_reported_with_row_number() {
    let mut csv = events_to_csv(&contiguous_events(2));
    csv.push_str(
        "P9,A,1,R-A,L2,not-a-time,2023-09-01 09:00:00,1.0,normal,,true,,40,true,MES,B001\n",
    );

    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, csv).unwrap();

    match CsvEventLogReader::new().read_path(&path) {
        Err(ImportError::DataIntegrity(DataIntegrityError::InvalidField { row, field, .. })) => {
            // 表头 + 4 行数据之后
            assert_eq!(row, 6);
            assert_eq!(field, "start_time");
        }
        other => panic!("unexpected result: {:?}", other.map(|l| l.event_count())),
    }
}

#[test]
fn test_empty_file_is_rejected() {
    let csv = events_to_csv(&[]);
    let result = CsvEventLogReader::new().read_str(&csv);
    assert!(matches!(
        result,
        Err(ImportError::DataIntegrity(DataIntegrityError::EmptyLog))
    ));
}
