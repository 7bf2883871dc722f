// ==========================================
// 混凝土站核心 - 导入层
// ==========================================
// 职责: Arkik 待导入行的批次校验与主数据解析
// 流程: 读取 → 映射加载 → 逐行解析 → 状态推导 → 报告
// ==========================================

// 模块声明
pub mod arkik_validator;
pub mod batch_validator_trait;
pub mod data_cleaner;
pub mod error;
pub mod file_parser;
pub mod lookup_maps;
pub mod price_resolver;
pub mod recipe_suggester;
pub mod resolution;

// 重导出核心类型
pub use arkik_validator::{derive_status, find_batch_duplicates, validate_row, ArkikValidator};
pub use error::{ImportError, ImportResult};
pub use file_parser::{parse_staging_json, parse_staging_rows};
pub use lookup_maps::{build_maps, LookupMaps};
pub use price_resolver::{select_price, PriceSelection};
pub use resolution::{ResolutionContext, ResolutionStrategy};

// 重导出 Trait 接口
pub use batch_validator_trait::BatchValidator;
