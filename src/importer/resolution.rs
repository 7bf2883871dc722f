// ==========================================
// 混凝土站核心 - 客户/工地解析策略链
// ==========================================
// 职责: 按固定优先级依次尝试解析策略，第一个命中即返回
// 红线: 每个策略只返回映射中已存在的实体；推断结果必须打标
// ==========================================

use crate::domain::arkik::{Client, ConstructionSite, ProductPrice, Recipe, StagingRow};
use crate::importer::data_cleaner::{normalize_name, normalize_null};
use crate::importer::lookup_maps::LookupMaps;
use serde::Serialize;

// ==========================================
// ResolutionStrategy - 解析策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    ExistingId,      // 行上已有 id 且存在于映射
    ExactCode,       // 编码精确匹配
    ExactName,       // 名称精确匹配（忽略大小写）
    PriceDerived,    // 由选中价格反推
    QuoteDerived,    // 由已批准报价反推
    UniqueCandidate, // 该配方的全部价格指向唯一候选
}

impl ResolutionStrategy {
    /// 是否属于推断（非精确）
    pub fn is_inferred(self) -> bool {
        matches!(
            self,
            ResolutionStrategy::PriceDerived
                | ResolutionStrategy::QuoteDerived
                | ResolutionStrategy::UniqueCandidate
        )
    }
}

/// 精确客户匹配（第 1 步）
pub const EXACT_CLIENT_STRATEGIES: &[ResolutionStrategy] = &[
    ResolutionStrategy::ExistingId,
    ResolutionStrategy::ExactCode,
    ResolutionStrategy::ExactName,
];

/// 客户回填（价格之后）
pub const BACKFILL_CLIENT_STRATEGIES: &[ResolutionStrategy] = &[
    ResolutionStrategy::PriceDerived,
    ResolutionStrategy::UniqueCandidate,
];

/// 精确工地匹配（第 2 步）
pub const EXACT_SITE_STRATEGIES: &[ResolutionStrategy] = &[
    ResolutionStrategy::ExistingId,
    ResolutionStrategy::ExactName,
];

/// 工地回填（价格之后）
pub const BACKFILL_SITE_STRATEGIES: &[ResolutionStrategy] = &[
    ResolutionStrategy::PriceDerived,
    ResolutionStrategy::QuoteDerived,
    ResolutionStrategy::UniqueCandidate,
];

/// 解析结果
#[derive(Debug, PartialEq)]
pub struct Resolved<'a, T> {
    pub entity: &'a T,
    pub strategy: ResolutionStrategy,
}

impl<T> Clone for Resolved<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Resolved<'_, T> {}

/// 单行解析上下文
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub row: &'a StagingRow,
    pub maps: &'a LookupMaps,
    pub recipe: Option<&'a Recipe>,
    pub price: Option<&'a ProductPrice>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(row: &'a StagingRow, maps: &'a LookupMaps) -> Self {
        Self {
            row,
            maps,
            recipe: None,
            price: None,
        }
    }

    fn recipe_prices(&self) -> &'a [ProductPrice] {
        match self.recipe {
            Some(recipe) => self.maps.prices_for_recipe(&recipe.id),
            None => &[],
        }
    }
}

// ==========================================
// 客户
// ==========================================

pub fn resolve_client<'a>(
    ctx: &ResolutionContext<'a>,
    strategies: &[ResolutionStrategy],
) -> Option<Resolved<'a, Client>> {
    strategies.iter().find_map(|&strategy| {
        client_by_strategy(ctx, strategy).map(|entity| Resolved { entity, strategy })
    })
}

fn client_by_strategy<'a>(ctx: &ResolutionContext<'a>, strategy: ResolutionStrategy) -> Option<&'a Client> {
    let maps = ctx.maps;
    match strategy {
        ResolutionStrategy::ExistingId => normalize_null(ctx.row.client_id.as_deref())
            .and_then(|id| maps.client(&id)),
        ResolutionStrategy::ExactCode => normalize_null(ctx.row.cliente_codigo.as_deref())
            .and_then(|code| maps.client_by_code(&code)),
        ResolutionStrategy::ExactName => maps.client_by_name(&ctx.row.cliente_name),
        ResolutionStrategy::PriceDerived => ctx
            .price
            .and_then(|p| normalize_null(p.client_id.as_deref()))
            .and_then(|id| maps.client(&id)),
        ResolutionStrategy::QuoteDerived => None,
        ResolutionStrategy::UniqueCandidate => {
            let candidates = client_candidates(ctx);
            match candidates.as_slice() {
                [only] => maps.client(only),
                _ => None,
            }
        }
    }
}

/// 该配方全部价格上出现的不同客户 id（仅限映射中存在的）
pub fn client_candidates(ctx: &ResolutionContext<'_>) -> Vec<String> {
    let mut ids: Vec<String> = ctx
        .recipe_prices()
        .iter()
        .filter_map(|p| normalize_null(p.client_id.as_deref()))
        .filter(|id| ctx.maps.client(id).is_some())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

// ==========================================
// 工地
// ==========================================

pub fn resolve_site<'a>(
    ctx: &ResolutionContext<'a>,
    client: &Client,
    strategies: &[ResolutionStrategy],
) -> Option<Resolved<'a, ConstructionSite>> {
    strategies.iter().find_map(|&strategy| {
        site_by_strategy(ctx, client, strategy).map(|entity| Resolved { entity, strategy })
    })
}

fn site_by_strategy<'a>(
    ctx: &ResolutionContext<'a>,
    client: &Client,
    strategy: ResolutionStrategy,
) -> Option<&'a ConstructionSite> {
    let maps = ctx.maps;
    match strategy {
        ResolutionStrategy::ExistingId => normalize_null(ctx.row.construction_site_id.as_deref())
            .and_then(|id| maps.site_by_id(&client.id, &id)),
        ResolutionStrategy::ExactName => maps.site(&client.id, &ctx.row.obra_name),
        ResolutionStrategy::ExactCode => None,
        ResolutionStrategy::PriceDerived => price_site_hint(ctx, client)
            .and_then(|name| maps.site(&client.id, &name)),
        ResolutionStrategy::QuoteDerived => quote_site_hint(ctx, client)
            .and_then(|name| maps.site(&client.id, &name)),
        ResolutionStrategy::UniqueCandidate => {
            let names = site_candidates(ctx, client);
            match names.as_slice() {
                [only] => maps.site(&client.id, only),
                _ => None,
            }
        }
    }
}

/// 选中价格上的工地名称（价格必须属于该客户）
pub fn price_site_hint(ctx: &ResolutionContext<'_>, client: &Client) -> Option<String> {
    ctx.price
        .filter(|p| p.client_id.as_deref() == Some(client.id.as_str()))
        .and_then(|p| normalize_null(p.construction_site.as_deref()))
}

/// 已批准报价中唯一的工地名称
pub fn quote_site_hint(ctx: &ResolutionContext<'_>, client: &Client) -> Option<String> {
    let recipe = ctx.recipe?;
    match ctx.maps.quote_sites(&client.id, &recipe.recipe_code).as_slice() {
        [only] => Some((*only).to_string()),
        _ => None,
    }
}

/// 该配方中属于该客户的价格上出现的不同工地名称
pub fn site_candidates(ctx: &ResolutionContext<'_>, client: &Client) -> Vec<String> {
    let mut seen: Vec<(String, String)> = Vec::new();
    for price in ctx.recipe_prices() {
        if price.client_id.as_deref() != Some(client.id.as_str()) {
            continue;
        }
        if let Some(name) = normalize_null(price.construction_site.as_deref()) {
            let key = normalize_name(&name);
            if !seen.iter().any(|(k, _)| *k == key) {
                seen.push((key, name));
            }
        }
    }
    seen.into_iter().map(|(_, name)| name).collect()
}

/// 未能解析工地时给出的候选名称（价格 > 报价 > 唯一候选）
pub fn suggested_site_name(ctx: &ResolutionContext<'_>, client: &Client) -> Option<String> {
    price_site_hint(ctx, client)
        .or_else(|| quote_site_hint(ctx, client))
        .or_else(|| match site_candidates(ctx, client).as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arkik::QuoteSiteHint;

    fn client(id: &str, code: &str, name: &str) -> Client {
        Client {
            id: id.to_string(),
            client_code: Some(code.to_string()),
            business_name: name.to_string(),
        }
    }

    fn site(id: &str, client_id: &str, name: &str) -> ConstructionSite {
        ConstructionSite {
            id: id.to_string(),
            client_id: client_id.to_string(),
            name: name.to_string(),
        }
    }

    fn recipe() -> Recipe {
        Recipe {
            id: "r1".to_string(),
            plant_id: Some("P1".to_string()),
            recipe_code: "FC250".to_string(),
            arkik_long_code: None,
        }
    }

    fn price(id: &str, client_id: Option<&str>, site: Option<&str>) -> ProductPrice {
        ProductPrice {
            id: id.to_string(),
            recipe_id: "r1".to_string(),
            code: "FC250".to_string(),
            client_id: client_id.map(str::to_string),
            construction_site: site.map(str::to_string),
            base_price: 1000.0,
            effective_date: None,
            updated_at: None,
        }
    }

    fn maps(prices: Vec<ProductPrice>, hints: Vec<QuoteSiteHint>) -> LookupMaps {
        LookupMaps::from_parts(
            "P1",
            vec![client("c1", "ACM", "Acme Corporation"), client("c2", "BTA", "Beta SA")],
            vec![site("s1", "c1", "Site A (Norte)"), site("s2", "c1", "Bodega")],
            vec![recipe()],
            prices,
            hints,
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_exact_client_strategies_in_order() {
        let maps = maps(vec![], vec![]);
        let row = StagingRow {
            cliente_codigo: Some("bta".to_string()),
            cliente_name: "Acme Corporation".to_string(),
            ..Default::default()
        };
        let ctx = ResolutionContext::new(&row, &maps);
        let hit = resolve_client(&ctx, EXACT_CLIENT_STRATEGIES).unwrap();
        assert_eq!(hit.entity.id, "c2");
        assert_eq!(hit.strategy, ResolutionStrategy::ExactCode);
        assert!(!hit.strategy.is_inferred());
    }

    #[test]
    fn test_unknown_preset_id_is_ignored() {
        let maps = maps(vec![], vec![]);
        let row = StagingRow {
            client_id: Some("ghost".to_string()),
            cliente_name: "acme corporation ".to_string(),
            ..Default::default()
        };
        let ctx = ResolutionContext::new(&row, &maps);
        let hit = resolve_client(&ctx, EXACT_CLIENT_STRATEGIES).unwrap();
        assert_eq!(hit.entity.id, "c1");
        assert_eq!(hit.strategy, ResolutionStrategy::ExactName);
    }

    #[test]
    fn test_price_backfill_client_and_site() {
        let prices = vec![price("p1", Some("c1"), Some("site a (norte)"))];
        let maps = maps(prices, vec![]);
        let recipe = maps.recipe("FC250").cloned();
        let row = StagingRow {
            cliente_name: "Acme Corp".to_string(),
            obra_name: "Site A".to_string(),
            ..Default::default()
        };
        let mut ctx = ResolutionContext::new(&row, &maps);
        ctx.recipe = recipe.as_ref();
        ctx.price = maps.prices_for_recipe("r1").first();

        let client = resolve_client(&ctx, BACKFILL_CLIENT_STRATEGIES).unwrap();
        assert_eq!(client.strategy, ResolutionStrategy::PriceDerived);
        assert!(resolve_site(&ctx, client.entity, EXACT_SITE_STRATEGIES).is_none());

        let site = resolve_site(&ctx, client.entity, BACKFILL_SITE_STRATEGIES).unwrap();
        assert_eq!(site.entity.id, "s1");
        assert_eq!(site.strategy, ResolutionStrategy::PriceDerived);
    }

    #[test]
    fn test_quote_hint_needs_single_site() {
        let hint = |name: &str| QuoteSiteHint {
            client_id: "c1".to_string(),
            recipe_code: "FC250".to_string(),
            construction_site: name.to_string(),
        };
        let row = StagingRow::default();
        let recipe = recipe();

        let single = maps(vec![], vec![hint("Bodega")]);
        let mut ctx = ResolutionContext::new(&row, &single);
        ctx.recipe = Some(&recipe);
        let c1 = single.client("c1").unwrap();
        let hit = resolve_site(&ctx, c1, BACKFILL_SITE_STRATEGIES).unwrap();
        assert_eq!(hit.entity.id, "s2");
        assert_eq!(hit.strategy, ResolutionStrategy::QuoteDerived);

        let ambiguous = maps(vec![], vec![hint("Bodega"), hint("Site A (Norte)")]);
        let mut ctx = ResolutionContext::new(&row, &ambiguous);
        ctx.recipe = Some(&recipe);
        let c1 = ambiguous.client("c1").unwrap();
        assert!(resolve_site(&ctx, c1, BACKFILL_SITE_STRATEGIES).is_none());
    }

    #[test]
    fn test_unique_candidate_client() {
        let prices = vec![price("p1", None, None), price("p2", Some("c2"), None)];
        let maps = maps(prices, vec![]);
        let recipe = maps.recipe("FC250").cloned();
        let row = StagingRow::default();
        let mut ctx = ResolutionContext::new(&row, &maps);
        ctx.recipe = recipe.as_ref();
        ctx.price = maps.prices_for_recipe("r1").first();

        let hit = resolve_client(&ctx, BACKFILL_CLIENT_STRATEGIES).unwrap();
        assert_eq!(hit.entity.id, "c2");
        assert_eq!(hit.strategy, ResolutionStrategy::UniqueCandidate);
    }
}
