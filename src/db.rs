// ==========================================
// 混凝土站核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发读写时的偶发 busy 错误
// - 提供核心所读取表的建表语句（本地库/测试库）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 核心只读依赖的表结构
///
/// 说明：线上库由外部系统维护，这里的结构用于本地库与测试库，字段与线上保持同名。
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    client_code TEXT,
    business_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS construction_sites (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(id),
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS recipes (
    id TEXT PRIMARY KEY,
    plant_id TEXT,
    recipe_code TEXT NOT NULL,
    arkik_long_code TEXT,
    strength_fc REAL
);

CREATE TABLE IF NOT EXISTS product_prices (
    id TEXT PRIMARY KEY,
    recipe_id TEXT NOT NULL REFERENCES recipes(id),
    code TEXT,
    client_id TEXT,
    construction_site TEXT,
    base_price REAL NOT NULL,
    effective_date TEXT,
    updated_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS quotes (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    construction_site TEXT,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quote_details (
    id TEXT PRIMARY KEY,
    quote_id TEXT NOT NULL REFERENCES quotes(id),
    recipe_id TEXT NOT NULL REFERENCES recipes(id)
);

CREATE TABLE IF NOT EXISTS arkik_material_mapping (
    id TEXT PRIMARY KEY,
    plant_id TEXT NOT NULL,
    arkik_code TEXT NOT NULL,
    material_id TEXT
);

CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    construction_site TEXT,
    delivery_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS remisiones (
    id TEXT PRIMARY KEY,
    plant_id TEXT,
    remision_number TEXT NOT NULL,
    fecha TEXT NOT NULL,
    order_id TEXT,
    recipe_id TEXT,
    volumen_fabricado REAL
);

CREATE TABLE IF NOT EXISTS remision_materiales (
    id TEXT PRIMARY KEY,
    remision_id TEXT NOT NULL,
    material_type TEXT,
    cantidad_real REAL
);

CREATE TABLE IF NOT EXISTS muestreos (
    id TEXT PRIMARY KEY,
    remision_id TEXT NOT NULL,
    fecha_muestreo TEXT,
    masa_unitaria REAL
);

CREATE TABLE IF NOT EXISTS muestras (
    id TEXT PRIMARY KEY,
    muestreo_id TEXT NOT NULL,
    tipo_muestra TEXT
);

CREATE TABLE IF NOT EXISTS ensayos (
    id TEXT PRIMARY KEY,
    muestra_id TEXT NOT NULL,
    fecha_ensayo TEXT,
    resistencia_calculada REAL,
    porcentaje_cumplimiento REAL,
    is_edad_garantia INTEGER NOT NULL DEFAULT 0,
    is_ensayo_fuera_tiempo INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_remisiones_plant_number ON remisiones(plant_id, remision_number);
CREATE INDEX IF NOT EXISTS idx_remisiones_order_fecha ON remisiones(order_id, fecha);
CREATE INDEX IF NOT EXISTS idx_orders_client_delivery ON orders(client_id, delivery_date);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开可在仓储之间共享的连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 建表（幂等）并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }
}
