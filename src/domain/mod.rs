// ==========================================
// 混凝土站核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod arkik;
pub mod quality;
pub mod types;

// 重导出核心类型
pub use arkik::{
    Client, ConstructionSite, ProductPrice, QuoteSiteHint, Recipe, StagingRow, ValidationError,
    ValidationReport, ValidationSummary,
};
pub use quality::{
    Ensayo, LoadProgress, Muestra, Muestreo, QualityAlert, QualityAlertKind, QualityAverages,
    QualityData, QualityGroup, QualityLoadState, QualityQuery, QualityRemision, QualitySummary,
    QualityTotals, RemisionMaterial, RemisionRecord, WeekSlice,
};
pub use types::{
    ComplianceStatus, PriceSource, QualityTrend, SliceOrder, ValidationErrorKind,
    ValidationStatus,
};
