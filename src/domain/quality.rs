// ==========================================
// 混凝土站核心 - 质量领域模型
// ==========================================
// 职责: 送货单 → 取样 → 试件 → 试验 嵌套结构，以及派生汇总
// 红线: 只有"有效试验"参与平均值计算（见 Ensayo::is_qualifying）
// ==========================================

use crate::domain::types::{ComplianceStatus, QualityTrend, SliceOrder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Ensayo - 强度试验
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensayo {
    pub id: String,
    pub fecha_ensayo: Option<NaiveDate>,
    pub resistencia_calculada: Option<f64>,   // 实测强度
    pub porcentaje_cumplimiento: Option<f64>, // 合规百分比（数据库预计算）
    pub is_edad_garantia: bool,               // 是否保证龄期试验
    pub is_ensayo_fuera_tiempo: bool,         // 是否超出试验窗口
}

impl Ensayo {
    /// 是否计入汇总
    ///
    /// 保证龄期 + 未超期 + 强度 > 0 + 合规值非空
    pub fn is_qualifying(&self) -> bool {
        self.is_edad_garantia
            && !self.is_ensayo_fuera_tiempo
            && self.resistencia_calculada.map_or(false, |r| r > 0.0)
            && self.porcentaje_cumplimiento.is_some()
    }
}

/// 试件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Muestra {
    pub id: String,
    pub tipo_muestra: Option<String>,
    pub ensayos: Vec<Ensayo>,
}

/// 取样事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Muestreo {
    pub id: String,
    pub fecha_muestreo: Option<NaiveDate>,
    pub masa_unitaria: Option<f64>, // 单位质量（kg/m³）
    pub muestras: Vec<Muestra>,
}

/// 送货单材料实耗
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemisionMaterial {
    pub material_type: Option<String>,
    pub cantidad_real: Option<f64>, // kg
}

// ==========================================
// RemisionRecord - 数据库读取的原始送货单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemisionRecord {
    pub id: String,
    pub remision_number: String,
    pub fecha: NaiveDate,
    pub volumen_fabricado: f64,
    pub order_id: String,
    pub recipe_id: Option<String>,
    pub recipe_code: Option<String>,
    pub strength_fc: Option<f64>,
    pub client_id: Option<String>,
    pub business_name: Option<String>,
    pub construction_site: Option<String>,
    pub muestreos: Vec<Muestreo>,
    pub materiales: Vec<RemisionMaterial>,
}

// ==========================================
// QualityRemision - 带派生指标的送货单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRemision {
    pub id: String,
    pub remision_number: String,
    pub fecha: NaiveDate,
    pub volume: f64,
    pub recipe_code: Option<String>,
    pub strength_fc: Option<f64>,
    pub construction_site: Option<String>,
    pub muestreos: Vec<Muestreo>,
    pub qualifying_ensayos: Vec<Ensayo>,
    pub avg_resistencia: f64,
    pub avg_compliance: f64,
    pub avg_masa_unitaria: f64,
    pub rendimiento_volumetrico: f64,
    pub compliance_status: ComplianceStatus,
}

impl QualityRemision {
    pub fn has_muestreos(&self) -> bool {
        !self.muestreos.is_empty()
    }
}

// ==========================================
// 分组汇总（按月 / 按配方 / 按工地）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityGroup {
    pub key: String,
    pub volume: f64,
    pub remisiones: usize,
    pub remisiones_muestreadas: usize,
    pub muestreos: usize,
    pub ensayos_validos: usize,
    pub avg_resistencia: f64,
    pub avg_compliance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityData {
    pub remisiones: Vec<QualityRemision>,
    pub monthly: Vec<QualityGroup>,
    pub by_recipe: Vec<QualityGroup>,
    pub by_construction_site: Vec<QualityGroup>,
}

// ==========================================
// QualitySummary - 汇总（不落库）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityTotals {
    pub volume: f64,
    pub remisiones: usize,
    pub remisiones_muestreadas: usize,
    pub muestreos: usize,
    pub ensayos_validos: usize,
    pub porcentaje_remisiones_muestreadas: f64, // 按单数覆盖率
    pub porcentaje_volumen_muestreado: f64,     // 按方量覆盖率
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAverages {
    pub resistencia: f64,
    pub compliance: f64,
    pub masa_unitaria: f64,
    pub rendimiento_volumetrico: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityAlertKind {
    LowCompliance,
    LowCoverage,
    NonCompliantRemisiones,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAlert {
    pub kind: QualityAlertKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub totals: QualityTotals,
    pub averages: QualityAverages,
    pub trend: QualityTrend,
    pub alerts: Vec<QualityAlert>,
}

impl Default for QualitySummary {
    fn default() -> Self {
        Self {
            totals: QualityTotals::default(),
            averages: QualityAverages::default(),
            trend: QualityTrend::Stable,
            alerts: Vec::new(),
        }
    }
}

// ==========================================
// 渐进式加载查询与状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityQuery {
    pub client_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub order: SliceOrder,
}

/// 周切片（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSlice {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityLoadState {
    pub data: Option<QualityData>,
    pub summary: Option<QualitySummary>,
    pub loading: bool,
    pub streaming: bool,
    pub progress: LoadProgress,
    pub error: Option<String>,
}
