// ==========================================
// 混凝土站核心 - 质量数据 Repository 实现
// ==========================================
// 职责: 读取送货单及其嵌套质量数据（使用 rusqlite）
// 装配: remisiones → muestreos → muestras → ensayos，remision_materiales
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::quality::{Ensayo, Muestra, Muestreo, RemisionMaterial, RemisionRecord};
use crate::repository::error::RepositoryResult;
use crate::repository::quality_repo::QualityRepository;
use crate::repository::sql_utils::{build_in_clause, params_with_list};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, ToSql};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// QualityRepositoryImpl
// ==========================================
pub struct QualityRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl QualityRepositoryImpl {
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

    /// 查询送货单下的取样（含试件/试验）
    fn load_muestreos(
        conn: &Connection,
        remision_ids: &[String],
    ) -> RepositoryResult<HashMap<String, Vec<Muestreo>>> {
        let mut by_remision: HashMap<String, Vec<Muestreo>> = HashMap::new();
        if remision_ids.is_empty() {
            return Ok(by_remision);
        }

        // 取样
        let sql = format!(
            "SELECT id, remision_id, fecha_muestreo, masa_unitaria FROM muestreos WHERE {} ORDER BY fecha_muestreo",
            build_in_clause("remision_id", remision_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let muestreo_rows = stmt
            .query_map(params_from_iter(remision_ids.iter()), |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    Muestreo {
                        id: row.get(0)?,
                        fecha_muestreo: row.get(2)?,
                        masa_unitaria: row.get(3)?,
                        muestras: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let muestreo_ids: Vec<String> = muestreo_rows.iter().map(|(_, m)| m.id.clone()).collect();
        let mut muestras = Self::load_muestras(conn, &muestreo_ids)?;

        for (remision_id, mut muestreo) in muestreo_rows {
            muestreo.muestras = muestras.remove(&muestreo.id).unwrap_or_default();
            by_remision.entry(remision_id).or_default().push(muestreo);
        }
        Ok(by_remision)
    }

    fn load_muestras(
        conn: &Connection,
        muestreo_ids: &[String],
    ) -> RepositoryResult<HashMap<String, Vec<Muestra>>> {
        let mut by_muestreo: HashMap<String, Vec<Muestra>> = HashMap::new();
        if muestreo_ids.is_empty() {
            return Ok(by_muestreo);
        }

        let sql = format!(
            "SELECT id, muestreo_id, tipo_muestra FROM muestras WHERE {}",
            build_in_clause("muestreo_id", muestreo_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let muestra_rows = stmt
            .query_map(params_from_iter(muestreo_ids.iter()), |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    Muestra {
                        id: row.get(0)?,
                        tipo_muestra: row.get(2)?,
                        ensayos: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let muestra_ids: Vec<String> = muestra_rows.iter().map(|(_, m)| m.id.clone()).collect();
        let mut ensayos = Self::load_ensayos(conn, &muestra_ids)?;

        for (muestreo_id, mut muestra) in muestra_rows {
            muestra.ensayos = ensayos.remove(&muestra.id).unwrap_or_default();
            by_muestreo.entry(muestreo_id).or_default().push(muestra);
        }
        Ok(by_muestreo)
    }

    fn load_ensayos(
        conn: &Connection,
        muestra_ids: &[String],
    ) -> RepositoryResult<HashMap<String, Vec<Ensayo>>> {
        let mut by_muestra: HashMap<String, Vec<Ensayo>> = HashMap::new();
        if muestra_ids.is_empty() {
            return Ok(by_muestra);
        }

        let sql = format!(
            r#"
            SELECT id, muestra_id, fecha_ensayo, resistencia_calculada, porcentaje_cumplimiento,
                   is_edad_garantia, is_ensayo_fuera_tiempo
            FROM ensayos WHERE {}
            "#,
            build_in_clause("muestra_id", muestra_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(muestra_ids.iter()), |row| {
            Ok((
                row.get::<_, String>(1)?,
                Ensayo {
                    id: row.get(0)?,
                    fecha_ensayo: row.get(2)?,
                    resistencia_calculada: row.get(3)?,
                    porcentaje_cumplimiento: row.get(4)?,
                    is_edad_garantia: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
                    is_ensayo_fuera_tiempo: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
                },
            ))
        })?;

        for row in rows {
            let (muestra_id, ensayo) = row?;
            by_muestra.entry(muestra_id).or_default().push(ensayo);
        }
        Ok(by_muestra)
    }

    fn load_materiales(
        conn: &Connection,
        remision_ids: &[String],
    ) -> RepositoryResult<HashMap<String, Vec<RemisionMaterial>>> {
        let mut by_remision: HashMap<String, Vec<RemisionMaterial>> = HashMap::new();
        if remision_ids.is_empty() {
            return Ok(by_remision);
        }

        let sql = format!(
            "SELECT remision_id, material_type, cantidad_real FROM remision_materiales WHERE {}",
            build_in_clause("remision_id", remision_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(remision_ids.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                RemisionMaterial {
                    material_type: row.get(1)?,
                    cantidad_real: row.get(2)?,
                },
            ))
        })?;

        for row in rows {
            let (remision_id, material) = row?;
            by_remision.entry(remision_id).or_default().push(material);
        }
        Ok(by_remision)
    }
}

#[async_trait]
impl QualityRepository for QualityRepositoryImpl {
    async fn find_order_ids_for_client(
        &self,
        client_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM orders WHERE client_id = ?1 AND delivery_date >= ?2 AND delivery_date <= ?3",
        )?;
        let rows = stmt.query_map(params![client_id, from, to], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_remisiones_in_window(
        &self,
        order_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<RemisionRecord>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock()?;
        let sql = format!(
            r#"
            SELECT rm.id, rm.remision_number, rm.fecha, rm.volumen_fabricado, rm.order_id,
                   rm.recipe_id, r.recipe_code, r.strength_fc,
                   o.client_id, c.business_name, o.construction_site
            FROM remisiones rm
            JOIN orders o ON o.id = rm.order_id
            LEFT JOIN recipes r ON r.id = rm.recipe_id
            LEFT JOIN clients c ON c.id = o.client_id
            WHERE rm.fecha >= ? AND rm.fecha <= ?
              AND rm.volumen_fabricado IS NOT NULL
              AND {}
            ORDER BY rm.fecha DESC
            "#,
            build_in_clause("rm.order_id", order_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let params = params_with_list(&[&start as &dyn ToSql, &end], order_ids);
        let mut records = stmt
            .query_map(params.as_slice(), |row| {
                Ok(RemisionRecord {
                    id: row.get(0)?,
                    remision_number: row.get(1)?,
                    fecha: row.get(2)?,
                    volumen_fabricado: row.get(3)?,
                    order_id: row.get(4)?,
                    recipe_id: row.get(5)?,
                    recipe_code: row.get(6)?,
                    strength_fc: row.get(7)?,
                    client_id: row.get(8)?,
                    business_name: row.get(9)?,
                    construction_site: row.get(10)?,
                    muestreos: Vec::new(),
                    materiales: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let remision_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut muestreos = Self::load_muestreos(&conn, &remision_ids)?;
        let mut materiales = Self::load_materiales(&conn, &remision_ids)?;

        for record in &mut records {
            record.muestreos = muestreos.remove(&record.id).unwrap_or_default();
            record.materiales = materiales.remove(&record.id).unwrap_or_default();
        }
        Ok(records)
    }
}
