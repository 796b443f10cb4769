// ==========================================
// 制造运营雷达 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod analysis_run_repo;
pub mod error;

// 重导出核心仓储
pub use analysis_run_repo::{AnalysisRunEntity, AnalysisRunRepository};
pub use error::{RepositoryError, RepositoryResult};
