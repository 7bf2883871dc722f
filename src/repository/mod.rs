// ==========================================
// 混凝土站核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,列表参数由调用方分块
// ==========================================

pub mod arkik_lookup_repo;
pub mod arkik_lookup_repo_impl;
pub mod error;
pub mod quality_repo;
pub mod quality_repo_impl;
pub mod sql_utils;

// 重导出核心仓储
pub use arkik_lookup_repo::ArkikLookupRepository;
pub use arkik_lookup_repo_impl::ArkikLookupRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use quality_repo::QualityRepository;
pub use quality_repo_impl::QualityRepositoryImpl;
