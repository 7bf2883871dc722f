// ==========================================
// 混凝土站核心 - 送货单质量映射
// ==========================================
// 职责: RemisionRecord → QualityRemision
// 派生: 有效试验 / 平均强度 / 平均合规率 / 单位质量 / 体积产率 / 合规状态
// 红线: 合规率只取数据库给出的 porcentaje_cumplimiento 求平均，不重新计算
// ==========================================

use crate::domain::quality::{Ensayo, Muestreo, QualityRemision, RemisionRecord};
use crate::domain::types::ComplianceStatus;

/// 算术平均（空集为 0）
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// 展开全部有效试验
pub fn qualifying_ensayos(muestreos: &[Muestreo]) -> Vec<Ensayo> {
    muestreos
        .iter()
        .flat_map(|m| m.muestras.iter())
        .flat_map(|m| m.ensayos.iter())
        .filter(|e| e.is_qualifying())
        .cloned()
        .collect()
}

/// 取样的单位质量（仅正值）
pub fn masas_unitarias(muestreos: &[Muestreo]) -> Vec<f64> {
    muestreos
        .iter()
        .filter_map(|m| m.masa_unitaria)
        .filter(|v| *v > 0.0)
        .collect()
}

/// 体积产率（%）
///
/// (Σ 实耗材料质量 ÷ 平均单位质量) ÷ 生产方量 × 100；任一分母为 0 或无材料时为 0
pub fn rendimiento_volumetrico(record: &RemisionRecord) -> f64 {
    let total_mass: f64 = record
        .materiales
        .iter()
        .filter_map(|m| m.cantidad_real)
        .sum();
    let avg_masa = average(&masas_unitarias(&record.muestreos));

    if record.materiales.is_empty() || total_mass <= 0.0 || avg_masa <= 0.0 {
        return 0.0;
    }
    if record.volumen_fabricado <= 0.0 {
        return 0.0;
    }
    (total_mass / avg_masa) / record.volumen_fabricado * 100.0
}

// ==========================================
// QualityMapper
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct QualityMapper {
    compliant_threshold: f64,
    pending_threshold: f64,
}

impl QualityMapper {
    pub fn new(compliant_threshold: f64, pending_threshold: f64) -> Self {
        Self {
            compliant_threshold,
            pending_threshold,
        }
    }

    /// 合规状态（无有效试验时为 pending）
    pub fn compliance_status(&self, avg_compliance: f64, has_qualifying: bool) -> ComplianceStatus {
        if !has_qualifying {
            ComplianceStatus::Pending
        } else if avg_compliance >= self.compliant_threshold {
            ComplianceStatus::Compliant
        } else if avg_compliance >= self.pending_threshold {
            ComplianceStatus::Pending
        } else {
            ComplianceStatus::NonCompliant
        }
    }

    pub fn map_remision(&self, record: RemisionRecord) -> QualityRemision {
        let qualifying = qualifying_ensayos(&record.muestreos);
        let resistencias: Vec<f64> = qualifying
            .iter()
            .filter_map(|e| e.resistencia_calculada)
            .collect();
        let compliances: Vec<f64> = qualifying
            .iter()
            .filter_map(|e| e.porcentaje_cumplimiento)
            .collect();
        let avg_compliance = average(&compliances);
        let rendimiento = rendimiento_volumetrico(&record);

        QualityRemision {
            compliance_status: self.compliance_status(avg_compliance, !qualifying.is_empty()),
            avg_resistencia: average(&resistencias),
            avg_compliance,
            avg_masa_unitaria: average(&masas_unitarias(&record.muestreos)),
            rendimiento_volumetrico: rendimiento,
            qualifying_ensayos: qualifying,
            id: record.id,
            remision_number: record.remision_number,
            fecha: record.fecha,
            volume: record.volumen_fabricado,
            recipe_code: record.recipe_code,
            strength_fc: record.strength_fc,
            construction_site: record.construction_site,
            muestreos: record.muestreos,
        }
    }
}

impl Default for QualityMapper {
    fn default() -> Self {
        Self::new(95.0, 80.0)
    }
}
