// ==========================================
// 制造运营雷达 - 分析运行结果仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 主键: log_version (同一事件日志快照只保留一份结果)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::bundle::ResultBundle;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

/// analysis_run 表记录
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRunEntity {
    pub run_id: String,
    pub log_version: String,
    pub piece_count: usize,
    pub event_count: usize,
    pub recommendation_count: usize,
    pub bundle_json: String,
    pub created_at: String,
}

impl AnalysisRunEntity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            log_version: row.get(1)?,
            piece_count: row.get::<_, i64>(2)? as usize,
            event_count: row.get::<_, i64>(3)? as usize,
            recommendation_count: row.get::<_, i64>(4)? as usize,
            bundle_json: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    /// 反序列化结果包
    pub fn bundle(&self) -> RepositoryResult<ResultBundle> {
        Ok(serde_json::from_str(&self.bundle_json)?)
    }
}

// ==========================================
// AnalysisRunRepository - 分析运行仓储
// ==========================================
pub struct AnalysisRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AnalysisRunRepository {
    /// 创建新的仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存结果包 (按 log_version UPSERT)
    ///
    /// # 返回
    /// - Ok(String): 该版本的 run_id;重复保存同一版本时沿用首次生成的 run_id
    pub fn save_bundle(
        &self,
        bundle: &ResultBundle,
        piece_count: usize,
        event_count: usize,
    ) -> RepositoryResult<String> {
        let bundle_json = bundle.to_json_pretty()?;
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO analysis_run (
                log_version, run_id, piece_count, event_count,
                recommendation_count, bundle_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(log_version) DO UPDATE SET
                piece_count = excluded.piece_count,
                event_count = excluded.event_count,
                recommendation_count = excluded.recommendation_count,
                bundle_json = excluded.bundle_json
            "#,
            params![
                bundle.log_version,
                Uuid::new_v4().to_string(),
                piece_count as i64,
                event_count as i64,
                bundle.recommendations.len() as i64,
                bundle_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let run_id: String = tx.query_row(
            "SELECT run_id FROM analysis_run WHERE log_version = ?1",
            params![bundle.log_version],
            |row| row.get(0),
        )?;

        tx.commit()?;

        info!(
            run_id = %run_id,
            log_version = %bundle.log_version,
            recommendations = bundle.recommendations.len(),
            "分析结果已保存"
        );
        Ok(run_id)
    }

    /// 按事件日志版本查询
    pub fn find_by_log_version(&self, log_version: &str) -> RepositoryResult<Option<AnalysisRunEntity>> {
        let conn = self.get_conn()?;
        let entity = conn
            .query_row(
                r#"
                SELECT run_id, log_version, piece_count, event_count,
                       recommendation_count, bundle_json, created_at
                FROM analysis_run
                WHERE log_version = ?1
                "#,
                params![log_version],
                AnalysisRunEntity::from_row,
            )
            .optional()?;
        Ok(entity)
    }

    /// 按事件日志版本加载结果包
    pub fn load_bundle(&self, log_version: &str) -> RepositoryResult<ResultBundle> {
        match self.find_by_log_version(log_version)? {
            Some(entity) => entity.bundle(),
            None => Err(RepositoryError::NotFound {
                entity: "AnalysisRun".to_string(),
                id: log_version.to_string(),
            }),
        }
    }

    /// 列出全部运行 (按版本号排序)
    pub fn list_runs(&self) -> RepositoryResult<Vec<AnalysisRunEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, log_version, piece_count, event_count,
                   recommendation_count, bundle_json, created_at
            FROM analysis_run
            ORDER BY log_version
            "#,
        )?;

        let runs = stmt
            .query_map([], AnalysisRunEntity::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// 删除某版本的结果
    pub fn delete_by_log_version(&self, log_version: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            "DELETE FROM analysis_run WHERE log_version = ?1",
            params![log_version],
        )?;
        Ok(count)
    }
}
