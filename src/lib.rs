// ==========================================
// 混凝土站核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 核心:
//   - Arkik 导入批次校验（客户/工地/配方/价格解析）
//   - 渐进式客户质量汇总（按周切片）
// 红线: 核心只读，不写业务表
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 质量汇总
pub mod engine;

// 导入层 - Arkik 批次校验
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ComplianceStatus, PriceSource, QualityTrend, SliceOrder, ValidationErrorKind, ValidationStatus,
};

// 领域实体
pub use domain::{
    QualityData, QualityLoadState, QualityQuery, QualitySummary, StagingRow, ValidationError,
    ValidationReport,
};

// 引擎 / 导入
pub use engine::{LoadOutcome, ProgressiveQualityLoader, QualityError};
pub use importer::{ArkikValidator, BatchValidator, ImportError, LookupMaps};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "混凝土站核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
