// ==========================================
// 混凝土站核心 - 质量汇总
// ==========================================
// 职责: 从累积的送货单整体重算 汇总 / 按月 / 按配方 / 按工地
// 红线: 每次合并后从全量累积重算，不做增量修补
//       平均值一律按有效试验的原始值求平均（不是"平均的平均"）
// ==========================================

use crate::domain::quality::{
    QualityAlert, QualityAlertKind, QualityAverages, QualityData, QualityGroup, QualityRemision,
    QualitySummary, QualityTotals,
};
use crate::domain::types::{ComplianceStatus, QualityTrend};
use crate::engine::quality_mapper::{average, masas_unitarias};
use std::collections::BTreeMap;

/// 抽样覆盖率告警阈值（%）
pub const LOW_COVERAGE_PCT: f64 = 10.0;
/// 月度趋势判定阈值（百分点）
pub const TREND_DELTA_PCT: f64 = 2.0;

const UNKNOWN_KEY: &str = "N/A";

fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

fn build_group(key: String, items: &[&QualityRemision]) -> QualityGroup {
    let resistencias: Vec<f64> = items
        .iter()
        .flat_map(|r| r.qualifying_ensayos.iter())
        .filter_map(|e| e.resistencia_calculada)
        .collect();
    let compliances: Vec<f64> = items
        .iter()
        .flat_map(|r| r.qualifying_ensayos.iter())
        .filter_map(|e| e.porcentaje_cumplimiento)
        .collect();

    QualityGroup {
        key,
        volume: items.iter().map(|r| r.volume).sum(),
        remisiones: items.len(),
        remisiones_muestreadas: items.iter().filter(|r| r.has_muestreos()).count(),
        muestreos: items.iter().map(|r| r.muestreos.len()).sum(),
        ensayos_validos: compliances.len(),
        avg_resistencia: average(&resistencias),
        avg_compliance: average(&compliances),
    }
}

fn group_by<F>(remisiones: &[QualityRemision], key_of: F) -> Vec<QualityGroup>
where
    F: Fn(&QualityRemision) -> String,
{
    let mut buckets: BTreeMap<String, Vec<&QualityRemision>> = BTreeMap::new();
    for remision in remisiones {
        buckets.entry(key_of(remision)).or_default().push(remision);
    }
    buckets
        .into_iter()
        .map(|(key, items)| build_group(key, &items))
        .collect()
}

fn non_empty_or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_KEY)
        .to_string()
}

/// 最近两个有有效试验的月份的合规率变化
pub fn monthly_trend(monthly: &[QualityGroup]) -> QualityTrend {
    let months: Vec<&QualityGroup> = monthly.iter().filter(|m| m.ensayos_validos > 0).collect();
    let [.., previous, latest] = months.as_slice() else {
        return QualityTrend::Stable;
    };
    let delta = latest.avg_compliance - previous.avg_compliance;
    if delta > TREND_DELTA_PCT {
        QualityTrend::Improving
    } else if delta < -TREND_DELTA_PCT {
        QualityTrend::Declining
    } else {
        QualityTrend::Stable
    }
}

// ==========================================
// QualityAggregator
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct QualityAggregator {
    pending_threshold: f64,
}

impl QualityAggregator {
    pub fn new(pending_threshold: f64) -> Self {
        Self { pending_threshold }
    }

    /// 从全量送货单重算数据与汇总
    pub fn aggregate(&self, mut remisiones: Vec<QualityRemision>) -> (QualityData, QualitySummary) {
        remisiones.sort_by(|a, b| {
            b.fecha
                .cmp(&a.fecha)
                .then_with(|| a.remision_number.cmp(&b.remision_number))
        });

        let monthly = group_by(&remisiones, |r| r.fecha.format("%Y-%m").to_string());
        let by_recipe = group_by(&remisiones, |r| non_empty_or_unknown(r.recipe_code.as_deref()));
        let by_construction_site =
            group_by(&remisiones, |r| non_empty_or_unknown(r.construction_site.as_deref()));

        let summary = self.summarize(&remisiones, &monthly);
        let data = QualityData {
            remisiones,
            monthly,
            by_recipe,
            by_construction_site,
        };
        (data, summary)
    }

    fn summarize(&self, remisiones: &[QualityRemision], monthly: &[QualityGroup]) -> QualitySummary {
        let all: Vec<&QualityRemision> = remisiones.iter().collect();
        let overall = build_group(String::new(), &all);

        let volume_muestreado: f64 = remisiones
            .iter()
            .filter(|r| r.has_muestreos())
            .map(|r| r.volume)
            .sum();
        let masas: Vec<f64> = remisiones
            .iter()
            .flat_map(|r| masas_unitarias(&r.muestreos))
            .collect();
        let rendimientos: Vec<f64> = remisiones
            .iter()
            .map(|r| r.rendimiento_volumetrico)
            .filter(|v| *v > 0.0)
            .collect();

        let totals = QualityTotals {
            volume: overall.volume,
            remisiones: overall.remisiones,
            remisiones_muestreadas: overall.remisiones_muestreadas,
            muestreos: overall.muestreos,
            ensayos_validos: overall.ensayos_validos,
            porcentaje_remisiones_muestreadas: percentage(
                overall.remisiones_muestreadas as f64,
                overall.remisiones as f64,
            ),
            porcentaje_volumen_muestreado: percentage(volume_muestreado, overall.volume),
        };
        let averages = QualityAverages {
            resistencia: overall.avg_resistencia,
            compliance: overall.avg_compliance,
            masa_unitaria: average(&masas),
            rendimiento_volumetrico: average(&rendimientos),
        };

        let non_compliant = remisiones
            .iter()
            .filter(|r| r.compliance_status == ComplianceStatus::NonCompliant)
            .count();
        let alerts = self.alerts(&totals, &averages, non_compliant);

        QualitySummary {
            totals,
            averages,
            trend: monthly_trend(monthly),
            alerts,
        }
    }

    fn alerts(&self, totals: &QualityTotals, averages: &QualityAverages, non_compliant: usize) -> Vec<QualityAlert> {
        let mut alerts = Vec::new();
        if totals.ensayos_validos > 0 && averages.compliance < self.pending_threshold {
            alerts.push(QualityAlert {
                kind: QualityAlertKind::LowCompliance,
                message: format!(
                    "平均合规率 {:.1}% 低于 {:.1}%",
                    averages.compliance, self.pending_threshold
                ),
            });
        }
        if totals.remisiones > 0 && totals.porcentaje_remisiones_muestreadas < LOW_COVERAGE_PCT {
            alerts.push(QualityAlert {
                kind: QualityAlertKind::LowCoverage,
                message: format!(
                    "抽样覆盖率 {:.1}% 低于 {:.1}%",
                    totals.porcentaje_remisiones_muestreadas, LOW_COVERAGE_PCT
                ),
            });
        }
        if non_compliant > 0 {
            alerts.push(QualityAlert {
                kind: QualityAlertKind::NonCompliantRemisiones,
                message: format!("{} 张送货单不合规", non_compliant),
            });
        }
        alerts
    }
}

impl Default for QualityAggregator {
    fn default() -> Self {
        Self::new(80.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quality::{Ensayo, Muestra, Muestreo};
    use chrono::NaiveDate;

    fn remision(id: &str, date: (i32, u32, u32), recipe: &str, compliances: &[f64]) -> QualityRemision {
        let ensayos: Vec<Ensayo> = compliances
            .iter()
            .enumerate()
            .map(|(i, pct)| Ensayo {
                id: format!("{}-e{}", id, i),
                fecha_ensayo: None,
                resistencia_calculada: Some(2.5 * pct),
                porcentaje_cumplimiento: Some(*pct),
                is_edad_garantia: true,
                is_ensayo_fuera_tiempo: false,
            })
            .collect();
        let muestreos = if ensayos.is_empty() {
            Vec::new()
        } else {
            vec![Muestreo {
                id: format!("{}-m", id),
                fecha_muestreo: None,
                masa_unitaria: Some(2400.0),
                muestras: vec![Muestra {
                    id: format!("{}-s", id),
                    tipo_muestra: None,
                    ensayos: ensayos.clone(),
                }],
            }]
        };
        let avg = average(compliances);
        QualityRemision {
            id: id.to_string(),
            remision_number: id.to_uppercase(),
            fecha: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            volume: 5.0,
            recipe_code: Some(recipe.to_string()),
            strength_fc: Some(250.0),
            construction_site: None,
            muestreos,
            qualifying_ensayos: ensayos,
            avg_resistencia: 2.5 * avg,
            avg_compliance: avg,
            avg_masa_unitaria: 2400.0,
            rendimiento_volumetrico: 0.0,
            compliance_status: if compliances.is_empty() {
                ComplianceStatus::Pending
            } else if avg >= 95.0 {
                ComplianceStatus::Compliant
            } else if avg >= 80.0 {
                ComplianceStatus::Pending
            } else {
                ComplianceStatus::NonCompliant
            },
        }
    }

    #[test]
    fn test_empty_accumulator_has_no_nan() {
        let (data, summary) = QualityAggregator::default().aggregate(Vec::new());
        assert!(data.remisiones.is_empty());
        assert!(data.monthly.is_empty());
        assert_eq!(summary.totals.remisiones, 0);
        assert_eq!(summary.averages.compliance, 0.0);
        assert_eq!(summary.totals.porcentaje_volumen_muestreado, 0.0);
        assert!(!summary.averages.resistencia.is_nan());
        assert_eq!(summary.trend, QualityTrend::Stable);
        assert!(summary.alerts.is_empty());
    }

    #[test]
    fn test_compliance_is_mean_of_raw_ensayos_not_mean_of_means() {
        let items = vec![
            remision("a", (2024, 5, 6), "FC250", &[100.0]),
            remision("b", (2024, 5, 7), "FC250", &[90.0, 90.0, 90.0]),
        ];
        let (data, summary) = QualityAggregator::default().aggregate(items);
        // (100 + 90*3) / 4 = 92.5
        assert!((summary.averages.compliance - 92.5).abs() < 1e-9);
        assert_eq!(summary.totals.ensayos_validos, 4);
        assert_eq!(data.by_recipe.len(), 1);
        assert!((data.by_recipe[0].avg_compliance - 92.5).abs() < 1e-9);
        assert_eq!(data.by_construction_site[0].key, "N/A");
    }

    #[test]
    fn test_groups_and_coverage() {
        let items = vec![
            remision("a", (2024, 4, 29), "FC250", &[100.0]),
            remision("b", (2024, 5, 2), "FC300", &[]),
            remision("c", (2024, 5, 3), "FC300", &[70.0]),
        ];
        let (data, summary) = QualityAggregator::default().aggregate(items);

        assert_eq!(data.remisiones[0].id, "c");
        let keys: Vec<&str> = data.monthly.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-04", "2024-05"]);
        assert_eq!(summary.totals.remisiones, 3);
        assert_eq!(summary.totals.remisiones_muestreadas, 2);
        assert!((summary.totals.porcentaje_volumen_muestreado - 200.0 / 3.0).abs() < 1e-9);
        assert!((summary.averages.masa_unitaria - 2400.0).abs() < 1e-9);
        assert_eq!(summary.trend, QualityTrend::Declining);
        assert!(summary
            .alerts
            .iter()
            .any(|a| a.kind == QualityAlertKind::NonCompliantRemisiones));
    }

    #[test]
    fn test_low_compliance_and_low_coverage_alerts() {
        let mut items: Vec<QualityRemision> = (0..10)
            .map(|i| remision(&format!("r{}", i), (2024, 5, 6), "FC250", &[]))
            .collect();
        items.push(remision("x", (2024, 5, 6), "FC250", &[50.0]));
        let (_, summary) = QualityAggregator::default().aggregate(items);
        let kinds: Vec<QualityAlertKind> = summary.alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&QualityAlertKind::LowCompliance));
        assert!(kinds.contains(&QualityAlertKind::LowCoverage));
    }

    #[test]
    fn test_monthly_trend() {
        let group = |key: &str, pct: f64| QualityGroup {
            key: key.to_string(),
            ensayos_validos: 1,
            avg_compliance: pct,
            ..Default::default()
        };
        assert_eq!(monthly_trend(&[group("2024-04", 90.0)]), QualityTrend::Stable);
        assert_eq!(
            monthly_trend(&[group("2024-04", 90.0), group("2024-05", 95.0)]),
            QualityTrend::Improving
        );
        assert_eq!(
            monthly_trend(&[group("2024-04", 90.0), group("2024-05", 91.0)]),
            QualityTrend::Stable
        );
    }
}
