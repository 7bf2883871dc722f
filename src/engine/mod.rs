// ==========================================
// 混凝土站核心 - 引擎层
// ==========================================
// 职责: 质量数据的切片、映射、汇总与渐进式加载
// 红线: Engine 不拼 SQL，数据一律经 Repository 读取
// ==========================================

pub mod error;
pub mod progressive_quality;
pub mod quality_aggregator;
pub mod quality_mapper;
pub mod week_slicer;

// 重导出核心引擎
pub use error::{QualityError, QualityResult};
pub use progressive_quality::{LoadOutcome, ProgressiveQualityLoader};
pub use quality_aggregator::QualityAggregator;
pub use quality_mapper::QualityMapper;
pub use week_slicer::week_slices;
