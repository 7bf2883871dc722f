// ==========================================
// 混凝土站核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、快照
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::plant_config_trait::PlantConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::SliceOrder;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn.lock()?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.conn.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "key".to_string(),
                message: "配置键不能为空".to_string(),
            });
        }

        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.trim().parse::<T>().ok())
            .unwrap_or(default))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 校验报告/质量报告附带当时生效的配置，便于复现
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.conn.lock()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&config_map)
            .map_err(|e| RepositoryError::InternalError(format!("配置快照序列化失败: {}", e)))
    }
}

#[async_trait]
impl PlantConfigReader for ConfigManager {
    // ===== Arkik 校验配置 =====

    async fn get_lookup_chunk_size(&self) -> RepositoryResult<usize> {
        let size = self.get_parsed_or(config_keys::LOOKUP_CHUNK_SIZE, 500usize)?;
        Ok(if size == 0 { 500 } else { size })
    }

    async fn get_max_recipe_suggestions(&self) -> RepositoryResult<usize> {
        self.get_parsed_or(config_keys::MAX_RECIPE_SUGGESTIONS, 3usize)
    }

    async fn get_suggestion_min_similarity(&self) -> RepositoryResult<f64> {
        let value = self.get_parsed_or(config_keys::SUGGESTION_MIN_SIMILARITY, 0.4f64)?;
        Ok(value.clamp(0.0, 1.0))
    }

    // ===== 质量汇总配置 =====

    async fn get_order_chunk_size(&self) -> RepositoryResult<usize> {
        let size = self.get_parsed_or(config_keys::ORDER_CHUNK_SIZE, 500usize)?;
        Ok(if size == 0 { 500 } else { size })
    }

    async fn get_slice_order(&self) -> RepositoryResult<SliceOrder> {
        Ok(self
            .get_config_value(config_keys::SLICE_ORDER)?
            .map(|v| SliceOrder::from_str(&v))
            .unwrap_or_default())
    }

    async fn get_compliant_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or(config_keys::COMPLIANT_THRESHOLD, 95.0f64)
    }

    async fn get_pending_threshold(&self) -> RepositoryResult<f64> {
        self.get_parsed_or(config_keys::PENDING_THRESHOLD, 80.0f64)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // Arkik 校验
    pub const LOOKUP_CHUNK_SIZE: &str = "arkik.lookup_chunk_size";
    pub const MAX_RECIPE_SUGGESTIONS: &str = "arkik.max_recipe_suggestions";
    pub const SUGGESTION_MIN_SIMILARITY: &str = "arkik.suggestion_min_similarity";

    // 质量汇总
    pub const ORDER_CHUNK_SIZE: &str = "quality.order_chunk_size";
    pub const SLICE_ORDER: &str = "quality.slice_order";
    pub const COMPLIANT_THRESHOLD: &str = "quality.compliant_threshold";
    pub const PENDING_THRESHOLD: &str = "quality.pending_threshold";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let config = manager();
        assert_eq!(config.get_lookup_chunk_size().await.unwrap(), 500);
        assert_eq!(config.get_max_recipe_suggestions().await.unwrap(), 3);
        assert_eq!(config.get_slice_order().await.unwrap(), SliceOrder::NewestFirst);
        assert_eq!(config.get_compliant_threshold().await.unwrap(), 95.0);
        assert_eq!(config.get_pending_threshold().await.unwrap(), 80.0);
    }

    #[tokio::test]
    async fn test_overrides_and_bad_values() {
        let config = manager();
        config
            .set_global_config_value(config_keys::SLICE_ORDER, "OLDEST_FIRST")
            .unwrap();
        config
            .set_global_config_value(config_keys::LOOKUP_CHUNK_SIZE, "abc")
            .unwrap();
        config
            .set_global_config_value(config_keys::ORDER_CHUNK_SIZE, "0")
            .unwrap();
        config
            .set_global_config_value(config_keys::SUGGESTION_MIN_SIMILARITY, "7")
            .unwrap();

        assert_eq!(config.get_slice_order().await.unwrap(), SliceOrder::OldestFirst);
        assert_eq!(config.get_lookup_chunk_size().await.unwrap(), 500);
        assert_eq!(config.get_order_chunk_size().await.unwrap(), 500);
        assert_eq!(config.get_suggestion_min_similarity().await.unwrap(), 1.0);

        let snapshot = config.get_config_snapshot().unwrap();
        assert!(snapshot.contains("quality.slice_order"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let config = manager();
        assert!(config.set_global_config_value("  ", "1").is_err());
    }
}
