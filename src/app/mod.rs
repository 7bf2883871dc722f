// ==========================================
// 混凝土站核心 - 应用层
// ==========================================
// 职责: 装配共享连接、配置与仓储，供命令行入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
