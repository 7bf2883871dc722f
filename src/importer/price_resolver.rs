// ==========================================
// 混凝土站核心 - 价格层级选择
// ==========================================
// 优先级: 客户+工地 > 客户 > 工厂级（无客户）
// 同层取最新: effective_date 降序，再按 updated_at 降序
// 兜底: 以上均无时取全部价格中最新的一条，来源按该价格自身的粒度标注
// ==========================================

use crate::domain::arkik::ProductPrice;
use crate::domain::types::PriceSource;
use crate::importer::data_cleaner::{normalize_name, normalize_null};

/// 选中的价格
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSelection<'a> {
    pub price: &'a ProductPrice,
    pub source: PriceSource,
}

/// 价格自身的粒度
pub fn price_granularity(price: &ProductPrice) -> PriceSource {
    match (
        normalize_null(price.client_id.as_deref()),
        normalize_null(price.construction_site.as_deref()),
    ) {
        (Some(_), Some(_)) => PriceSource::ClientSite,
        (Some(_), None) => PriceSource::Client,
        (None, _) => PriceSource::Plant,
    }
}

fn most_recent<'a>(prices: impl Iterator<Item = &'a ProductPrice>) -> Option<&'a ProductPrice> {
    prices.max_by(|a, b| {
        a.effective_date
            .cmp(&b.effective_date)
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    })
}

/// 为一行选择价格
///
/// # 参数
/// - prices: 该配方的全部有效价格
/// - client_id: 已解析的客户（可无）
/// - site_name: 已解析或原始的工地名称（可无）
pub fn select_price<'a>(
    prices: &'a [ProductPrice],
    client_id: Option<&str>,
    site_name: Option<&str>,
) -> Option<PriceSelection<'a>> {
    if prices.is_empty() {
        return None;
    }

    let site = site_name.map(normalize_name).filter(|s| !s.is_empty());
    let same_client = |p: &&ProductPrice| client_id.is_some() && p.client_id.as_deref() == client_id;

    if let Some(site) = site.as_deref() {
        let hit = most_recent(prices.iter().filter(same_client).filter(|p| {
            p.construction_site
                .as_deref()
                .map(normalize_name)
                .as_deref()
                == Some(site)
        }));
        if let Some(price) = hit {
            return Some(PriceSelection {
                price,
                source: PriceSource::ClientSite,
            });
        }
    }

    if let Some(price) = most_recent(prices.iter().filter(same_client)) {
        return Some(PriceSelection {
            price,
            source: PriceSource::Client,
        });
    }

    if let Some(price) = most_recent(
        prices
            .iter()
            .filter(|p| normalize_null(p.client_id.as_deref()).is_none()),
    ) {
        return Some(PriceSelection {
            price,
            source: PriceSource::Plant,
        });
    }

    most_recent(prices.iter()).map(|price| PriceSelection {
        price,
        source: price_granularity(price),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn price(id: &str, client: Option<&str>, site: Option<&str>, date: (i32, u32, u32), amount: f64) -> ProductPrice {
        ProductPrice {
            id: id.to_string(),
            recipe_id: "r1".to_string(),
            code: "FC250".to_string(),
            client_id: client.map(str::to_string),
            construction_site: site.map(str::to_string),
            base_price: amount,
            effective_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            updated_at: None,
        }
    }

    #[test]
    fn test_client_site_tier_wins() {
        let prices = vec![
            price("plant", None, None, (2024, 6, 1), 1000.0),
            price("client", Some("c1"), None, (2024, 6, 1), 1100.0),
            price("site", Some("c1"), Some("Site A"), (2024, 1, 1), 1200.0),
        ];
        let sel = select_price(&prices, Some("c1"), Some("site a")).unwrap();
        assert_eq!(sel.price.id, "site");
        assert_eq!(sel.source, PriceSource::ClientSite);

        let sel = select_price(&prices, Some("c1"), Some("Site B")).unwrap();
        assert_eq!(sel.price.id, "client");
        assert_eq!(sel.source, PriceSource::Client);

        let sel = select_price(&prices, Some("c2"), None).unwrap();
        assert_eq!(sel.price.id, "plant");
        assert_eq!(sel.source, PriceSource::Plant);
    }

    #[test]
    fn test_most_recent_effective_date_within_tier() {
        let prices = vec![
            price("old", Some("c1"), None, (2023, 1, 1), 900.0),
            price("new", Some("c1"), None, (2024, 3, 1), 950.0),
        ];
        let sel = select_price(&prices, Some("c1"), None).unwrap();
        assert_eq!(sel.price.id, "new");
        assert_eq!(sel.price.base_price, 950.0);
    }

    #[test]
    fn test_updated_at_breaks_ties() {
        let mut a = price("a", None, None, (2024, 1, 1), 1.0);
        let mut b = price("b", None, None, (2024, 1, 1), 2.0);
        a.updated_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        b.updated_at = Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        let prices = vec![a, b];
        assert_eq!(select_price(&prices, None, None).unwrap().price.id, "b");
    }

    #[test]
    fn test_fallback_to_any_price_when_client_unknown() {
        let prices = vec![price("only", Some("c9"), Some("Site A (Norte)"), (2024, 1, 1), 1.0)];
        let sel = select_price(&prices, None, Some("Site A")).unwrap();
        assert_eq!(sel.price.id, "only");
        assert_eq!(sel.source, PriceSource::ClientSite);
        assert!(select_price(&[], None, None).is_none());
    }
}
