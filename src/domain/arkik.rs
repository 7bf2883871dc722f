// ==========================================
// 混凝土站核心 - Arkik 导入领域模型
// ==========================================
// 职责: 待导入行、校验错误、主数据实体、校验报告
// 红线: 解析出的 id 必须来自主数据映射，不得凭空生成
// ==========================================

use crate::domain::types::{PriceSource, ValidationErrorKind, ValidationStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// StagingRow - 待导入行
// ==========================================
// 用途: 文件解析层产出，校验器填充解析结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingRow {
    // ===== 原始字段 =====
    pub row_number: usize,                       // 原始文件行号
    pub remision_number: String,                 // 送货单号
    pub fecha: Option<NaiveDate>,                // 送货日期
    pub cliente_codigo: Option<String>,          // 客户编码
    pub cliente_name: String,                    // 客户名称（自由文本）
    pub obra_name: String,                       // 工地名称（自由文本）
    pub product_description: Option<String>,     // 配方长编码（主）
    pub recipe_code: Option<String>,             // 配方技术编码（备）
    pub volumen_fabricado: f64,                  // 生产方量（m³）

    // ===== 材料用量（材料编码 → 数量）=====
    #[serde(default)]
    pub materials_teorico: BTreeMap<String, f64>, // 理论用量
    #[serde(default)]
    pub materials_real: BTreeMap<String, f64>,    // 实际用量

    // ===== 解析结果 =====
    pub client_id: Option<String>,
    pub construction_site_id: Option<String>,
    pub recipe_id: Option<String>,
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub price_source: PriceSource,

    // ===== 推断标记（由价格/报价反推，而非精确匹配）=====
    #[serde(default)]
    pub client_inferred: bool,
    #[serde(default)]
    pub site_inferred: bool,
    pub suggested_client_id: Option<String>,     // 无法唯一确定时的候选客户
    pub suggested_site_name: Option<String>,     // 无法唯一确定时的候选工地

    // ===== 校验 =====
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
    #[serde(default)]
    pub validation_status: ValidationStatus,
}

impl StagingRow {
    /// 行内引用的全部材料编码（理论 + 实际，去重排序）
    pub fn material_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .materials_teorico
            .keys()
            .chain(self.materials_real.keys())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }
}

// ==========================================
// ValidationError - 校验错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row_number: usize,
    pub error_type: ValidationErrorKind,
    pub field_name: String,
    pub field_value: String,
    pub message: String,
    pub suggestion: Option<serde_json::Value>,
    pub recoverable: bool,
}

impl ValidationError {
    pub fn new(
        row_number: usize,
        error_type: ValidationErrorKind,
        field_name: &str,
        field_value: &str,
        message: String,
    ) -> Self {
        Self {
            row_number,
            error_type,
            field_name: field_name.to_string(),
            field_value: field_value.to_string(),
            message,
            suggestion: None,
            recoverable: error_type != ValidationErrorKind::DuplicateRemision,
        }
    }

    pub fn with_suggestion(mut self, suggestion: serde_json::Value) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

// ==========================================
// 主数据实体（只读）
// ==========================================

/// 客户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub client_code: Option<String>,
    pub business_name: String,
}

/// 工地
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionSite {
    pub id: String,
    pub client_id: String,
    pub name: String,
}

/// 配方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub plant_id: Option<String>,
    pub recipe_code: String,              // 技术编码
    pub arkik_long_code: Option<String>,  // Arkik 长编码
}

/// 产品价格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub id: String,
    pub recipe_id: String,                 // 定价时关联的配方行（可能属于其他工厂）
    pub code: String,                      // 配方编码（用于跨工厂重映射）
    pub client_id: Option<String>,
    pub construction_site: Option<String>, // 工地名称
    pub base_price: f64,
    pub effective_date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 已批准报价中的工地提示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSiteHint {
    pub client_id: String,
    pub recipe_code: String,
    pub construction_site: String,
}

// ==========================================
// ValidationReport - 批次校验报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub batch_id: String,
    pub plant_id: String,
    pub summary: ValidationSummary,
    pub rows: Vec<StagingRow>,
    pub errors: Vec<ValidationError>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
}

impl ValidationSummary {
    pub fn from_rows(rows: &[StagingRow]) -> Self {
        let mut summary = ValidationSummary {
            total_rows: rows.len(),
            ..Default::default()
        };
        for row in rows {
            match row.validation_status {
                ValidationStatus::Valid => summary.valid += 1,
                ValidationStatus::Warning => summary.warning += 1,
                ValidationStatus::Error => summary.error += 1,
                ValidationStatus::Pending => {}
            }
        }
        summary
    }
}
