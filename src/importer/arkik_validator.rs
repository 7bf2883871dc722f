// ==========================================
// 混凝土站核心 - Arkik 批次校验器
// ==========================================
// 职责: 将待导入行解析到主数据（客户/工地/配方/价格），标注错误与状态
// 流程: 加载映射（一次）→ 逐行纯函数解析 → 汇总
// 单行顺序:
//   1. 客户精确匹配（已有 id / 编码 / 名称）
//   2. 工地精确匹配（该客户名下，忽略大小写）
//   3. 配方（长编码优先，缺失时用技术编码；未命中给出相似编码）
//   4. 价格层级选择
//   5. 由价格/报价回填客户与工地（打推断标记）
//   6. 价格指向唯一候选时回填
//   7. 材料映射
//   8. 重复送货单（库内已存在或批次内重复，不可恢复）
// 状态: 行上已有错误与新错误合并判定；存在不可恢复错误 → error；存在可恢复错误 → warning；否则 valid
// ==========================================

use crate::config::plant_config_trait::PlantConfigReader;
use crate::config::settings::ResolverSettings;
use crate::domain::arkik::{StagingRow, ValidationError, ValidationReport, ValidationSummary};
use crate::domain::types::{PriceSource, ValidationErrorKind, ValidationStatus};
use crate::importer::batch_validator_trait::BatchValidator;
use crate::importer::data_cleaner::normalize_null;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::lookup_maps::{build_maps, LookupMaps};
use crate::importer::price_resolver::select_price;
use crate::importer::recipe_suggester::suggest_codes;
use crate::importer::resolution::{
    client_candidates, resolve_client, resolve_site, suggested_site_name, ResolutionContext,
    BACKFILL_CLIENT_STRATEGIES, BACKFILL_SITE_STRATEGIES, EXACT_CLIENT_STRATEGIES,
    EXACT_SITE_STRATEGIES,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==========================================
// ArkikValidator - 批次校验器
// ==========================================
pub struct ArkikValidator<R, C>
where
    R: crate::repository::ArkikLookupRepository + ?Sized,
    C: PlantConfigReader + ?Sized,
{
    // 目标工厂
    plant_id: String,

    // 主数据查询
    lookup_repo: Arc<R>,

    // 配置读取器
    config: Arc<C>,
}

impl<R, C> ArkikValidator<R, C>
where
    R: crate::repository::ArkikLookupRepository + ?Sized,
    C: PlantConfigReader + ?Sized,
{
    pub fn new(plant_id: impl Into<String>, lookup_repo: Arc<R>, config: Arc<C>) -> Self {
        Self {
            plant_id: plant_id.into(),
            lookup_repo,
            config,
        }
    }

    pub fn plant_id(&self) -> &str {
        &self.plant_id
    }

    async fn load_settings(&self) -> ImportResult<ResolverSettings> {
        ResolverSettings::load(self.config.as_ref())
            .await
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))
    }
}

#[async_trait]
impl<R, C> BatchValidator for ArkikValidator<R, C>
where
    R: crate::repository::ArkikLookupRepository + ?Sized + 'static,
    C: PlantConfigReader + ?Sized + 'static,
{
    #[instrument(skip(self, rows), fields(plant_id = %self.plant_id, rows = rows.len()))]
    async fn validate_batch(
        &self,
        rows: Vec<StagingRow>,
    ) -> ImportResult<(Vec<StagingRow>, Vec<ValidationError>)> {
        let start = Instant::now();
        if self.plant_id.trim().is_empty() {
            return Err(ImportError::MissingPlantId);
        }
        if rows.is_empty() {
            debug!("空批次，跳过校验");
            return Ok((Vec::new(), Vec::new()));
        }

        // === 步骤 1: 参数 + 主数据映射 ===
        let settings = self.load_settings().await?;
        let maps = build_maps(self.lookup_repo.as_ref(), &self.plant_id, &rows, &settings).await?;

        // === 步骤 2: 逐行解析 ===
        let duplicates = find_batch_duplicates(&rows);
        let validated: Vec<StagingRow> = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| validate_row(&maps, &settings, row, duplicates.contains(&idx)))
            .collect();

        // === 步骤 3: 汇总 ===
        let errors: Vec<ValidationError> = validated
            .iter()
            .flat_map(|row| row.validation_errors.iter().cloned())
            .collect();
        let summary = ValidationSummary::from_rows(&validated);
        info!(
            valid = summary.valid,
            warning = summary.warning,
            error = summary.error,
            errors = errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "批次校验完成"
        );

        Ok((validated, errors))
    }

    async fn validate_and_report(&self, rows: Vec<StagingRow>) -> ImportResult<ValidationReport> {
        let start = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        info!(batch_id = %batch_id, plant_id = %self.plant_id, "开始校验批次");

        let (rows, errors) = self.validate_batch(rows).await?;

        Ok(ValidationReport {
            batch_id,
            plant_id: self.plant_id.clone(),
            summary: ValidationSummary::from_rows(&rows),
            rows,
            errors,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

// ==========================================
// 纯函数部分
// ==========================================

/// 批次内重复出现的送货单（首次出现之后的行下标）
pub fn find_batch_duplicates(rows: &[StagingRow]) -> HashSet<usize> {
    let mut seen: HashSet<&str> = HashSet::new();
    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let number = row.remision_number.trim();
            if number.is_empty() || seen.insert(number) {
                None
            } else {
                Some(idx)
            }
        })
        .collect()
}

/// 由错误推导行状态
pub fn derive_status(errors: &[ValidationError]) -> ValidationStatus {
    if errors.iter().any(|e| !e.recoverable) {
        ValidationStatus::Error
    } else if errors.is_empty() {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Warning
    }
}

/// 单行解析结果（全部为自有值，再统一写回行）
#[derive(Debug, Default)]
struct RowOutcome {
    client_id: Option<String>,
    client_inferred: bool,
    construction_site_id: Option<String>,
    site_inferred: bool,
    recipe_id: Option<String>,
    price: Option<(f64, PriceSource)>,
    suggested_client_id: Option<String>,
    suggested_site_name: Option<String>,
    errors: Vec<ValidationError>,
}

/// 校验单行（不访问数据库）
pub fn validate_row(
    maps: &LookupMaps,
    settings: &ResolverSettings,
    mut row: StagingRow,
    duplicate_in_batch: bool,
) -> StagingRow {
    let outcome = resolve_row(maps, settings, &row, duplicate_in_batch);

    row.client_id = outcome.client_id;
    row.client_inferred = outcome.client_inferred;
    row.construction_site_id = outcome.construction_site_id;
    row.site_inferred = outcome.site_inferred;
    row.recipe_id = outcome.recipe_id;
    row.unit_price = outcome.price.map(|(amount, _)| amount);
    row.price_source = outcome.price.map(|(_, source)| source).unwrap_or_default();
    row.suggested_client_id = outcome.suggested_client_id;
    row.suggested_site_name = outcome.suggested_site_name;

    // 保留行上已有的错误，新错误去重后追加
    for err in outcome.errors {
        if !row.validation_errors.contains(&err) {
            row.validation_errors.push(err);
        }
    }
    row.validation_status = derive_status(&row.validation_errors);
    row
}

fn resolve_row(
    maps: &LookupMaps,
    settings: &ResolverSettings,
    row: &StagingRow,
    duplicate_in_batch: bool,
) -> RowOutcome {
    let n = row.row_number;
    let mut out = RowOutcome::default();
    let mut ctx = ResolutionContext::new(row, maps);
    let obra = normalize_null(Some(&row.obra_name));

    // ===== 1/2. 精确匹配 =====
    let exact_client = resolve_client(&ctx, EXACT_CLIENT_STRATEGIES);
    let exact_site = exact_client.and_then(|c| resolve_site(&ctx, c.entity, EXACT_SITE_STRATEGIES));

    // ===== 3. 配方 =====
    let recipe_input = normalize_null(row.product_description.as_deref())
        .or_else(|| normalize_null(row.recipe_code.as_deref()));
    ctx.recipe = recipe_input.as_deref().and_then(|code| maps.recipe(code));
    let recipe_error = match ctx.recipe {
        Some(recipe) => {
            out.recipe_id = Some(recipe.id.clone());
            None
        }
        None => {
            let value = recipe_input.unwrap_or_default();
            let candidates = if value.is_empty() {
                Vec::new()
            } else {
                suggest_codes(
                    &value,
                    maps.known_recipe_codes(),
                    settings.max_recipe_suggestions,
                    settings.suggestion_min_similarity,
                )
            };
            let message = if candidates.is_empty() {
                format!("配方未找到: '{}'", value)
            } else {
                format!("配方未找到: '{}'，相似编码: {}", value, candidates.join(", "))
            };
            let err = ValidationError::new(
                n,
                ValidationErrorKind::RecipeNotFound,
                "product_description",
                &value,
                message,
            );
            Some(if candidates.is_empty() {
                err
            } else {
                err.with_suggestion(json!({ "recipe_codes": candidates }))
            })
        }
    };

    // ===== 4. 价格（以精确匹配结果选择）=====
    ctx.price = ctx
        .recipe
        .and_then(|recipe| {
            select_price(
                maps.prices_for_recipe(&recipe.id),
                exact_client.map(|c| c.entity.id.as_str()),
                exact_site.map(|s| s.entity.name.as_str()).or(obra.as_deref()),
            )
        })
        .map(|sel| sel.price);

    // ===== 5/6. 回填 =====
    let client = exact_client.or_else(|| resolve_client(&ctx, BACKFILL_CLIENT_STRATEGIES));
    let site = client.and_then(|c| {
        resolve_site(&ctx, c.entity, EXACT_SITE_STRATEGIES)
            .or_else(|| resolve_site(&ctx, c.entity, BACKFILL_SITE_STRATEGIES))
    });

    // 推断出的客户没有落到工地时只作建议，不采纳
    let (client, site) = match (client, site) {
        (Some(c), None) if c.strategy.is_inferred() => {
            out.suggested_client_id = Some(c.entity.id.clone());
            out.suggested_site_name = suggested_site_name(&ctx, c.entity);
            (None, None)
        }
        pair => pair,
    };

    match client {
        Some(c) => {
            out.client_id = Some(c.entity.id.clone());
            out.client_inferred = c.strategy.is_inferred();
        }
        None => {
            let candidates = client_candidates(&ctx);
            let value = normalize_null(Some(&row.cliente_name))
                .or_else(|| normalize_null(row.cliente_codigo.as_deref()))
                .unwrap_or_default();
            let mut err = ValidationError::new(
                n,
                ValidationErrorKind::ClientNotFound,
                "cliente_name",
                &value,
                format!("客户未找到: '{}'", value),
            );
            if out.suggested_client_id.is_some() || !candidates.is_empty() {
                err = err.with_suggestion(json!({
                    "client_id": out.suggested_client_id,
                    "candidates": candidates,
                }));
            }
            out.errors.push(err);
        }
    }

    let site_owner = client
        .map(|c| c.entity)
        .or_else(|| out.suggested_client_id.as_deref().and_then(|id| maps.client(id)));
    match (site, site_owner) {
        (Some(s), _) => {
            out.construction_site_id = Some(s.entity.id.clone());
            out.site_inferred = s.strategy.is_inferred();
        }
        (None, Some(owner)) => {
            if out.suggested_site_name.is_none() {
                out.suggested_site_name = suggested_site_name(&ctx, owner);
            }
            let err = ValidationError::new(
                n,
                ValidationErrorKind::SiteNotFound,
                "obra_name",
                &row.obra_name,
                format!("工地未找到: '{}'（客户 {}）", row.obra_name.trim(), owner.business_name),
            );
            out.errors.push(match &out.suggested_site_name {
                Some(name) => err.with_suggestion(json!({ "construction_site": name })),
                None => err,
            });
        }
        (None, None) => {}
    }

    out.errors.extend(recipe_error);

    // ===== 最终价格（以最终客户/工地重新选择）=====
    if let Some(recipe) = ctx.recipe {
        let site_name = site.map(|s| s.entity.name.as_str()).or(obra.as_deref());
        match select_price(
            maps.prices_for_recipe(&recipe.id),
            client.map(|c| c.entity.id.as_str()),
            site_name,
        ) {
            Some(sel) => out.price = Some((sel.price.base_price, sel.source)),
            None => out.errors.push(
                ValidationError::new(
                    n,
                    ValidationErrorKind::RecipeHasNoPrice,
                    "recipe_code",
                    &recipe.recipe_code,
                    format!("配方 '{}' 没有有效价格", recipe.recipe_code),
                )
                .with_suggestion(json!({
                    "action": "create_price",
                    "recipe_id": recipe.id,
                    "recipe_code": recipe.recipe_code,
                })),
            ),
        }
    }

    // ===== 7. 材料 =====
    for code in row.material_codes() {
        if !maps.is_material_mapped(&code) {
            out.errors.push(
                ValidationError::new(
                    n,
                    ValidationErrorKind::MaterialNotMapped,
                    "materials",
                    &code,
                    format!("材料编码 '{}' 未在工厂 {} 映射", code, maps.plant_id),
                )
                .with_suggestion(json!({
                    "action": "add_mapping",
                    "material_code": code,
                    "plant_id": maps.plant_id,
                })),
            );
        }
    }

    // ===== 8. 重复送货单 =====
    let number = row.remision_number.trim();
    if !number.is_empty() && (duplicate_in_batch || maps.remision_exists(number)) {
        let message = if duplicate_in_batch {
            format!("送货单 '{}' 在本批次中重复", number)
        } else {
            format!("送货单 '{}' 已存在", number)
        };
        out.errors.push(ValidationError::new(
            n,
            ValidationErrorKind::DuplicateRemision,
            "remision_number",
            number,
            message,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arkik::{Client, ConstructionSite, ProductPrice, Recipe};

    fn maps() -> LookupMaps {
        LookupMaps::from_parts(
            "P1",
            vec![Client {
                id: "c1".to_string(),
                client_code: Some("ACM".to_string()),
                business_name: "Acme Corporation S.A.".to_string(),
            }],
            vec![ConstructionSite {
                id: "s1".to_string(),
                client_id: "c1".to_string(),
                name: "Site A (Norte)".to_string(),
            }],
            vec![Recipe {
                id: "r1".to_string(),
                plant_id: Some("P1".to_string()),
                recipe_code: "FC250".to_string(),
                arkik_long_code: Some("5-250-2-B-28-14-D-2-000".to_string()),
            }],
            vec![ProductPrice {
                id: "pp1".to_string(),
                recipe_id: "r1".to_string(),
                code: "FC250".to_string(),
                client_id: Some("c1".to_string()),
                construction_site: Some("Site A (Norte)".to_string()),
                base_price: 1850.0,
                effective_date: None,
                updated_at: None,
            }],
            vec![],
            vec!["C001".to_string()],
            vec!["R-OLD".to_string()],
        )
    }

    fn row(remision: &str, client: &str, obra: &str) -> StagingRow {
        StagingRow {
            row_number: 1,
            remision_number: remision.to_string(),
            cliente_name: client.to_string(),
            obra_name: obra.to_string(),
            product_description: Some("5-250-2-b-28-14-d-2-000".to_string()),
            volumen_fabricado: 7.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_row_is_valid() {
        let out = validate_row(
            &maps(),
            &ResolverSettings::default(),
            row("R-1", "ACME CORPORATION S.A.", "site a (norte)"),
            false,
        );
        assert_eq!(out.validation_status, ValidationStatus::Valid);
        assert_eq!(out.client_id.as_deref(), Some("c1"));
        assert_eq!(out.construction_site_id.as_deref(), Some("s1"));
        assert_eq!(out.recipe_id.as_deref(), Some("r1"));
        assert_eq!(out.unit_price, Some(1850.0));
        assert_eq!(out.price_source, PriceSource::ClientSite);
        assert!(!out.client_inferred && !out.site_inferred);
    }

    #[test]
    fn test_backfill_from_price_marks_inferred() {
        let out = validate_row(
            &maps(),
            &ResolverSettings::default(),
            row("R-1", "Acme Corp", "Site A"),
            false,
        );
        assert_eq!(out.client_id.as_deref(), Some("c1"));
        assert_eq!(out.construction_site_id.as_deref(), Some("s1"));
        assert!(out.client_inferred);
        assert!(out.site_inferred);
        assert!(out
            .validation_errors
            .iter()
            .all(|e| e.error_type != ValidationErrorKind::SiteNotFound));
        assert_eq!(out.validation_status, ValidationStatus::Valid);
    }

    #[test]
    fn test_unknown_recipe_gets_suggestions() {
        let mut input = row("R-1", "Acme Corporation S.A.", "Site A (Norte)");
        input.product_description = Some("5-250-2-B-28-14-D-2-001".to_string());
        let out = validate_row(&maps(), &ResolverSettings::default(), input, false);

        let err = out
            .validation_errors
            .iter()
            .find(|e| e.error_type == ValidationErrorKind::RecipeNotFound)
            .unwrap();
        assert!(err.recoverable);
        assert!(err.suggestion.is_some());
        assert_eq!(out.validation_status, ValidationStatus::Warning);
        assert!(out.recipe_id.is_none());
    }

    #[test]
    fn test_duplicate_beats_recoverable_errors() {
        let mut input = row("R-OLD", "Nobody", "Nowhere");
        input.materials_real.insert("X999".to_string(), 1.0);
        let out = validate_row(&maps(), &ResolverSettings::default(), input, false);
        assert_eq!(out.validation_status, ValidationStatus::Error);
        assert!(out
            .validation_errors
            .iter()
            .any(|e| e.error_type == ValidationErrorKind::MaterialNotMapped && e.field_value == "X999"));
    }

    #[test]
    fn test_existing_fatal_error_is_kept() {
        let mut input = row("R-1", "ACME CORPORATION S.A.", "Site A (Norte)");
        let existing = ValidationError::new(
            1,
            ValidationErrorKind::DuplicateRemision,
            "remision_number",
            "R-1",
            "上游标记重复".to_string(),
        );
        input.validation_errors.push(existing.clone());

        let out = validate_row(&maps(), &ResolverSettings::default(), input, false);
        assert_eq!(out.client_id.as_deref(), Some("c1"));
        assert_eq!(out.validation_errors, vec![existing]);
        assert_eq!(out.validation_status, ValidationStatus::Error);

        // 再次校验不重复追加
        let again = validate_row(&maps(), &ResolverSettings::default(), out, false);
        assert_eq!(again.validation_errors.len(), 1);
        assert_eq!(again.validation_status, ValidationStatus::Error);
    }

    #[test]
    fn test_missing_price_and_mapping_carry_actions() {
        let bare = LookupMaps::from_parts(
            "P1",
            vec![],
            vec![],
            vec![Recipe {
                id: "r1".to_string(),
                plant_id: Some("P1".to_string()),
                recipe_code: "FC250".to_string(),
                arkik_long_code: None,
            }],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let mut input = row("R-1", "", "");
        input.product_description = None;
        input.recipe_code = Some("FC250".to_string());
        input.materials_teorico.insert("X999".to_string(), 1.0);

        let out = validate_row(&bare, &ResolverSettings::default(), input, false);
        let price_err = out
            .validation_errors
            .iter()
            .find(|e| e.error_type == ValidationErrorKind::RecipeHasNoPrice)
            .unwrap();
        assert_eq!(
            price_err.suggestion,
            Some(json!({ "action": "create_price", "recipe_id": "r1", "recipe_code": "FC250" }))
        );
        let material_err = out
            .validation_errors
            .iter()
            .find(|e| e.error_type == ValidationErrorKind::MaterialNotMapped)
            .unwrap();
        assert_eq!(
            material_err.suggestion,
            Some(json!({ "action": "add_mapping", "material_code": "X999", "plant_id": "P1" }))
        );
    }

    #[test]
    fn test_recipe_candidates_in_message() {
        let mut input = row("R-1", "Acme Corporation S.A.", "Site A (Norte)");
        input.product_description = Some("FC251".to_string());
        let out = validate_row(&maps(), &ResolverSettings::default(), input, false);

        let err = out
            .validation_errors
            .iter()
            .find(|e| e.error_type == ValidationErrorKind::RecipeNotFound)
            .unwrap();
        assert!(err.message.contains("FC250"));
        assert_eq!(err.suggestion, Some(json!({ "recipe_codes": ["FC250"] })));
    }

    #[test]
    fn test_find_batch_duplicates_flags_later_rows() {
        let rows = vec![
            row("R-1", "", ""),
            row("R-2", "", ""),
            row(" R-1 ", "", ""),
            row("", "", ""),
            row("", "", ""),
        ];
        let dups = find_batch_duplicates(&rows);
        assert_eq!(dups, HashSet::from([2usize]));
    }

    #[test]
    fn test_derive_status_precedence() {
        let recoverable =
            ValidationError::new(1, ValidationErrorKind::SiteNotFound, "obra_name", "x", String::new());
        let fatal = ValidationError::new(
            1,
            ValidationErrorKind::DuplicateRemision,
            "remision_number",
            "x",
            String::new(),
        );
        assert_eq!(derive_status(&[]), ValidationStatus::Valid);
        assert_eq!(derive_status(&[recoverable.clone()]), ValidationStatus::Warning);
        assert_eq!(derive_status(&[recoverable, fatal]), ValidationStatus::Error);
    }
}
