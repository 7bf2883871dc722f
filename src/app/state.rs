// ==========================================
// 混凝土站核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、配置与仓储
// ==========================================

use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_shared_connection};
use crate::engine::{ProgressiveQualityLoader, QualityResult};
use crate::importer::ArkikValidator;
use crate::repository::{ArkikLookupRepositoryImpl, QualityRepositoryImpl};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 应用状态
///
/// 所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理
    pub config_manager: Arc<ConfigManager>,

    /// Arkik 主数据查询
    pub lookup_repo: Arc<ArkikLookupRepositoryImpl>,

    /// 质量数据查询
    pub quality_repo: Arc<QualityRepositoryImpl>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表（幂等）
    /// 2. 初始化配置管理器
    /// 3. 初始化所有Repository
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_shared_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        {
            let guard = conn
                .lock()
                .map_err(|e| format!("数据库锁获取失败: {}", e))?;
            ensure_schema(&guard).map_err(|e| format!("建表失败: {}", e))?;
        }

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let lookup_repo = Arc::new(ArkikLookupRepositoryImpl::from_connection(conn.clone()));
        let quality_repo = Arc::new(QualityRepositoryImpl::from_connection(conn.clone()));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            conn,
            config_manager,
            lookup_repo,
            quality_repo,
        })
    }

    /// 为指定工厂创建批次校验器
    pub fn arkik_validator(&self, plant_id: &str) -> ArkikValidator<ArkikLookupRepositoryImpl, ConfigManager> {
        ArkikValidator::new(plant_id, self.lookup_repo.clone(), self.config_manager.clone())
    }

    /// 按当前配置创建质量加载器
    pub async fn quality_loader(&self) -> QualityResult<ProgressiveQualityLoader<QualityRepositoryImpl>> {
        ProgressiveQualityLoader::from_config(self.quality_repo.clone(), self.config_manager.as_ref()).await
    }
}

/// 获取默认数据库路径
///
/// 优先级: CONCRETE_PLANT_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CONCRETE_PLANT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./concrete_plant.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("concrete-plant");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("concrete_plant.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_state_initializes_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();
        let state = AppState::new(db_path).unwrap();

        let version = {
            let conn = state.conn.lock().unwrap();
            crate::db::read_schema_version(&conn).unwrap()
        };
        assert_eq!(version, Some(crate::db::CURRENT_SCHEMA_VERSION));
        assert_eq!(state.arkik_validator("P1").plant_id(), "P1");
    }
}
