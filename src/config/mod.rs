// ==========================================
// 混凝土站核心 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod plant_config_trait;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use plant_config_trait::PlantConfigReader;
pub use settings::{QualitySettings, ResolverSettings};
