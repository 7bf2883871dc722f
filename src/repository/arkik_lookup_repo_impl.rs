// ==========================================
// 混凝土站核心 - Arkik 主数据查询 Repository 实现
// ==========================================
// 职责: 实现校验器只读查询（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据读取
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::arkik::{Client, ConstructionSite, ProductPrice, QuoteSiteHint, Recipe};
use crate::repository::arkik_lookup_repo::ArkikLookupRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{build_in_clause, params_with_list};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

/// 与 `importer::data_cleaner::normalize_recipe_code` 对齐的 SQL 表达式
const NORMALIZED_RECIPE_CODE: &str = "UPPER(\
    REPLACE(REPLACE(REPLACE(REPLACE(REPLACE(r.recipe_code, \
    ' ', ''), char(9), ''), char(10), ''), char(12), ''), char(13), ''))";

fn map_client(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        client_code: row.get(1)?,
        business_name: row.get(2)?,
    })
}

// ==========================================
// ArkikLookupRepositoryImpl
// ==========================================
pub struct ArkikLookupRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ArkikLookupRepositoryImpl {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn query_clients(&self, sql: &str, values: &[String]) -> RepositoryResult<Vec<Client>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), map_client)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl ArkikLookupRepository for ArkikLookupRepositoryImpl {
    async fn find_clients_by_code_or_name(
        &self,
        lower_codes: &[String],
        lower_names: &[String],
    ) -> RepositoryResult<Vec<Client>> {
        if lower_codes.is_empty() && lower_names.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, client_code, business_name FROM clients WHERE {} OR {}",
            build_in_clause("LOWER(TRIM(client_code))", lower_codes),
            build_in_clause("LOWER(TRIM(business_name))", lower_names),
        );
        let mut values = lower_codes.to_vec();
        values.extend_from_slice(lower_names);
        self.query_clients(&sql, &values)
    }

    async fn find_clients_by_ids(&self, client_ids: &[String]) -> RepositoryResult<Vec<Client>> {
        if client_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, client_code, business_name FROM clients WHERE {}",
            build_in_clause("id", client_ids)
        );
        self.query_clients(&sql, client_ids)
    }

    async fn find_sites_by_client_ids(
        &self,
        client_ids: &[String],
    ) -> RepositoryResult<Vec<ConstructionSite>> {
        if client_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, client_id, name FROM construction_sites WHERE is_active = 1 AND {}",
            build_in_clause("client_id", client_ids)
        );
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(client_ids.iter()), |row| {
            Ok(ConstructionSite {
                id: row.get(0)?,
                client_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_recipes_by_plant(&self, plant_id: &str) -> RepositoryResult<Vec<Recipe>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, plant_id, recipe_code, arkik_long_code FROM recipes WHERE plant_id = ?1",
        )?;
        let rows = stmt.query_map([plant_id], |row| {
            Ok(Recipe {
                id: row.get(0)?,
                plant_id: row.get(1)?,
                recipe_code: row.get(2)?,
                arkik_long_code: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_active_prices_by_recipe_codes(
        &self,
        normalized_codes: &[String],
    ) -> RepositoryResult<Vec<ProductPrice>> {
        if normalized_codes.is_empty() {
            return Ok(Vec::new());
        }

        // 不按工厂过滤：价格可能挂在其他工厂的同编码配方上
        let sql = format!(
            r#"
            SELECT pp.id, pp.recipe_id, {code}, pp.client_id, pp.construction_site,
                   pp.base_price, pp.effective_date, pp.updated_at
            FROM product_prices pp
            JOIN recipes r ON r.id = pp.recipe_id
            WHERE pp.is_active = 1 AND {filter}
            "#,
            code = NORMALIZED_RECIPE_CODE,
            filter = build_in_clause(NORMALIZED_RECIPE_CODE, normalized_codes),
        );
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(normalized_codes.iter()), |row| {
            Ok(ProductPrice {
                id: row.get(0)?,
                recipe_id: row.get(1)?,
                code: row.get(2)?,
                client_id: row.get(3)?,
                construction_site: row.get(4)?,
                base_price: row.get(5)?,
                effective_date: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_quote_site_hints(
        &self,
        client_ids: &[String],
    ) -> RepositoryResult<Vec<QuoteSiteHint>> {
        if client_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT q.client_id, {code}, q.construction_site
            FROM quotes q
            JOIN quote_details qd ON qd.quote_id = q.id
            JOIN recipes r ON r.id = qd.recipe_id
            WHERE UPPER(q.status) = 'APPROVED'
              AND q.construction_site IS NOT NULL
              AND {filter}
            "#,
            code = NORMALIZED_RECIPE_CODE,
            filter = build_in_clause("q.client_id", client_ids),
        );
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(client_ids.iter()), |row| {
            Ok(QuoteSiteHint {
                client_id: row.get(0)?,
                recipe_code: row.get(1)?,
                construction_site: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_mapped_material_codes(&self, plant_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt =
            conn.prepare("SELECT arkik_code FROM arkik_material_mapping WHERE plant_id = ?1")?;
        let rows = stmt.query_map([plant_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_existing_remision_numbers(
        &self,
        plant_id: &str,
        remision_numbers: &[String],
    ) -> RepositoryResult<Vec<String>> {
        if remision_numbers.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT remision_number FROM remisiones WHERE plant_id = ? AND {}",
            build_in_clause("remision_number", remision_numbers)
        );
        let plant = plant_id.to_string();
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let params = params_with_list(&[&plant as &dyn ToSql], remision_numbers);
        let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::from)
    }
}
