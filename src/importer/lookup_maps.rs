// ==========================================
// 混凝土站核心 - Arkik 主数据映射
// ==========================================
// 职责: 按批次一次性加载主数据并建立内存索引
// 红线: 单行校验期间不再访问数据库；所有解析出的 id 都来自这里
// 流程:
//   第一波（并发）: 配方 / 客户（编码+名称）/ 预置客户 id / 材料映射 / 已存在送货单
//   第二波: 按命中的配方编码取价格（跨工厂），再补充价格引用的客户
//   第三波（并发）: 全部已知客户的工地 / 报价工地提示
// ==========================================

use crate::config::settings::ResolverSettings;
use crate::domain::arkik::{Client, ConstructionSite, ProductPrice, QuoteSiteHint, Recipe, StagingRow};
use crate::importer::data_cleaner::{
    normalize_material_code, normalize_name, normalize_null, normalize_recipe_code,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::arkik_lookup_repo::ArkikLookupRepository;
use crate::repository::error::RepositoryResult;
use crate::repository::sql_utils::chunk_values;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use tracing::{debug, info, instrument};

// ==========================================
// LookupMaps - 批次级只读索引
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LookupMaps {
    pub plant_id: String,
    clients_by_id: HashMap<String, Client>,
    client_id_by_code: HashMap<String, String>,                        // 小写编码 → id
    client_id_by_name: HashMap<String, String>,                        // 小写名称 → id
    sites_by_client: HashMap<String, HashMap<String, ConstructionSite>>, // client_id → 小写名称 → 工地
    recipes_by_code: HashMap<String, Recipe>,                          // 规范化技术编码 → 配方
    recipes_by_alt_code: HashMap<String, Recipe>,                      // 规范化长编码 → 配方
    prices_by_recipe: HashMap<String, Vec<ProductPrice>>,              // 本厂配方 id → 价格
    quote_sites: HashMap<String, BTreeMap<String, String>>,            // "clientId::CODE" → 小写名称 → 原名
    mapped_materials: HashSet<String>,
    existing_remisiones: HashSet<String>,
    known_codes: Vec<String>,
}

/// 报价提示键
pub fn quote_key(client_id: &str, recipe_code: &str) -> String {
    format!("{}::{}", client_id, normalize_recipe_code(recipe_code))
}

impl LookupMaps {
    /// 由已加载的主数据建立索引
    ///
    /// 价格按 `code` 重映射到本厂同编码的配方；没有对应本厂配方的价格被丢弃
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        plant_id: &str,
        clients: Vec<Client>,
        sites: Vec<ConstructionSite>,
        recipes: Vec<Recipe>,
        prices: Vec<ProductPrice>,
        quote_hints: Vec<QuoteSiteHint>,
        mapped_materials: Vec<String>,
        existing_remisiones: Vec<String>,
    ) -> Self {
        let mut maps = LookupMaps {
            plant_id: plant_id.to_string(),
            ..Default::default()
        };

        for client in clients {
            if let Some(code) = normalize_null(client.client_code.as_deref()) {
                maps.client_id_by_code
                    .entry(normalize_name(&code))
                    .or_insert_with(|| client.id.clone());
            }
            let name = normalize_name(&client.business_name);
            if !name.is_empty() {
                maps.client_id_by_name
                    .entry(name)
                    .or_insert_with(|| client.id.clone());
            }
            maps.clients_by_id.insert(client.id.clone(), client);
        }

        for site in sites {
            let name = normalize_name(&site.name);
            if name.is_empty() {
                continue;
            }
            maps.sites_by_client
                .entry(site.client_id.clone())
                .or_default()
                .entry(name)
                .or_insert(site);
        }

        let mut known: BTreeMap<String, String> = BTreeMap::new();
        for recipe in recipes {
            let code = normalize_recipe_code(&recipe.recipe_code);
            if let Some(alt) = normalize_null(recipe.arkik_long_code.as_deref()) {
                known.entry(normalize_recipe_code(&alt)).or_insert_with(|| alt.clone());
                maps.recipes_by_alt_code
                    .entry(normalize_recipe_code(&alt))
                    .or_insert_with(|| recipe.clone());
            }
            if !code.is_empty() {
                known
                    .entry(code.clone())
                    .or_insert_with(|| recipe.recipe_code.trim().to_string());
                maps.recipes_by_code.entry(code).or_insert(recipe);
            }
        }
        maps.known_codes = known.into_values().collect();

        for price in prices {
            let code = normalize_recipe_code(&price.code);
            if let Some(recipe) = maps.recipes_by_code.get(&code) {
                maps.prices_by_recipe
                    .entry(recipe.id.clone())
                    .or_default()
                    .push(price);
            }
        }

        for hint in quote_hints {
            let Some(site) = normalize_null(Some(&hint.construction_site)) else {
                continue;
            };
            maps.quote_sites
                .entry(quote_key(&hint.client_id, &hint.recipe_code))
                .or_default()
                .entry(normalize_name(&site))
                .or_insert(site);
        }

        maps.mapped_materials = mapped_materials
            .iter()
            .map(|c| normalize_material_code(c))
            .filter(|c| !c.is_empty())
            .collect();
        maps.existing_remisiones = existing_remisiones
            .iter()
            .map(|r| r.trim().to_string())
            .collect();

        maps
    }

    // ===== 客户 =====

    pub fn client(&self, client_id: &str) -> Option<&Client> {
        self.clients_by_id.get(client_id)
    }

    pub fn client_by_code(&self, code: &str) -> Option<&Client> {
        self.client_id_by_code
            .get(&normalize_name(code))
            .and_then(|id| self.clients_by_id.get(id))
    }

    pub fn client_by_name(&self, name: &str) -> Option<&Client> {
        self.client_id_by_name
            .get(&normalize_name(name))
            .and_then(|id| self.clients_by_id.get(id))
    }

    // ===== 工地 =====

    pub fn site(&self, client_id: &str, name: &str) -> Option<&ConstructionSite> {
        self.sites_by_client
            .get(client_id)
            .and_then(|sites| sites.get(&normalize_name(name)))
    }

    pub fn site_by_id(&self, client_id: &str, site_id: &str) -> Option<&ConstructionSite> {
        self.sites_by_client
            .get(client_id)
            .and_then(|sites| sites.values().find(|s| s.id == site_id))
    }

    // ===== 配方 / 价格 =====

    /// 按规范化编码查配方：先长编码，再技术编码
    pub fn recipe(&self, code: &str) -> Option<&Recipe> {
        let normalized = normalize_recipe_code(code);
        self.recipes_by_alt_code
            .get(&normalized)
            .or_else(|| self.recipes_by_code.get(&normalized))
    }

    pub fn prices_for_recipe(&self, recipe_id: &str) -> &[ProductPrice] {
        self.prices_by_recipe
            .get(recipe_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 已批准报价中（客户, 配方）对应的不同工地名称
    pub fn quote_sites(&self, client_id: &str, recipe_code: &str) -> Vec<&str> {
        self.quote_sites
            .get(&quote_key(client_id, recipe_code))
            .map(|sites| sites.values().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// 编码建议的候选全集
    pub fn known_recipe_codes(&self) -> impl Iterator<Item = &str> {
        self.known_codes.iter().map(String::as_str)
    }

    // ===== 材料 / 送货单 =====

    pub fn is_material_mapped(&self, code: &str) -> bool {
        self.mapped_materials.contains(&normalize_material_code(code))
    }

    pub fn remision_exists(&self, remision_number: &str) -> bool {
        self.existing_remisiones.contains(remision_number.trim())
    }

    pub fn client_count(&self) -> usize {
        self.clients_by_id.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes_by_code.len()
    }
}

// ==========================================
// 分块查询
// ==========================================

/// 按块顺序执行查询并合并结果
async fn fetch_chunked<T, F, Fut>(values: &[String], chunk_size: usize, fetch: F) -> RepositoryResult<Vec<T>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = RepositoryResult<Vec<T>>>,
{
    let mut out = Vec::new();
    for chunk in chunk_values(values, chunk_size) {
        out.extend(fetch(chunk).await?);
    }
    Ok(out)
}

fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ==========================================
// build_maps - 批次主数据加载
// ==========================================
#[instrument(skip(repo, rows, settings), fields(rows = rows.len()))]
pub async fn build_maps<R>(
    repo: &R,
    plant_id: &str,
    rows: &[StagingRow],
    settings: &ResolverSettings,
) -> ImportResult<LookupMaps>
where
    R: ArkikLookupRepository + ?Sized,
{
    let chunk = settings.lookup_chunk_size;

    let codes = distinct(
        rows.iter()
            .filter_map(|r| normalize_null(r.cliente_codigo.as_deref()))
            .map(|c| normalize_name(&c)),
    );
    let names = distinct(rows.iter().map(|r| normalize_name(&r.cliente_name)));
    let preset_ids = distinct(rows.iter().filter_map(|r| normalize_null(r.client_id.as_deref())));
    let remision_numbers = distinct(rows.iter().map(|r| r.remision_number.trim().to_string()));
    debug!(
        codes = codes.len(),
        names = names.len(),
        remisiones = remision_numbers.len(),
        "批次键收集完成"
    );

    // ===== 第一波 =====
    let (recipes, by_code, by_name, preset, materials, existing) = futures::try_join!(
        async {
            repo.find_recipes_by_plant(plant_id)
                .await
                .map_err(ImportError::lookup("recipes"))
        },
        async {
            fetch_chunked(&codes, chunk, |c| async move {
                repo.find_clients_by_code_or_name(&c, &[]).await
            })
            .await
            .map_err(ImportError::lookup("clients_by_code"))
        },
        async {
            fetch_chunked(&names, chunk, |c| async move {
                repo.find_clients_by_code_or_name(&[], &c).await
            })
            .await
            .map_err(ImportError::lookup("clients_by_name"))
        },
        async {
            fetch_chunked(&preset_ids, chunk, |c| async move {
                repo.find_clients_by_ids(&c).await
            })
            .await
            .map_err(ImportError::lookup("clients_by_id"))
        },
        async {
            repo.find_mapped_material_codes(plant_id)
                .await
                .map_err(ImportError::lookup("materials"))
        },
        async {
            fetch_chunked(&remision_numbers, chunk, |c| async move {
                repo.find_existing_remision_numbers(plant_id, &c).await
            })
            .await
            .map_err(ImportError::lookup("remisiones"))
        },
    )?;

    let mut clients: HashMap<String, Client> = HashMap::new();
    for client in by_code.into_iter().chain(by_name).chain(preset) {
        clients.entry(client.id.clone()).or_insert(client);
    }

    // ===== 第二波: 价格 =====
    let probe = LookupMaps::from_parts(
        plant_id,
        Vec::new(),
        Vec::new(),
        recipes.clone(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );
    let price_codes = distinct(rows.iter().filter_map(|row| {
        let code = normalize_null(row.product_description.as_deref())
            .or_else(|| normalize_null(row.recipe_code.as_deref()))?;
        probe
            .recipe(&code)
            .map(|recipe| normalize_recipe_code(&recipe.recipe_code))
    }));

    let prices = fetch_chunked(&price_codes, chunk, |c| async move {
        repo.find_active_prices_by_recipe_codes(&c).await
    })
    .await
    .map_err(ImportError::lookup("prices"))?;

    let missing_ids = distinct(
        prices
            .iter()
            .filter_map(|p| normalize_null(p.client_id.as_deref()))
            .filter(|id| !clients.contains_key(id)),
    );
    let price_clients = fetch_chunked(&missing_ids, chunk, |c| async move {
        repo.find_clients_by_ids(&c).await
    })
    .await
    .map_err(ImportError::lookup("price_clients"))?;
    for client in price_clients {
        clients.entry(client.id.clone()).or_insert(client);
    }

    // ===== 第三波: 工地 + 报价提示 =====
    let client_ids = distinct(clients.keys().cloned());
    let (sites, hints) = futures::try_join!(
        async {
            fetch_chunked(&client_ids, chunk, |c| async move {
                repo.find_sites_by_client_ids(&c).await
            })
            .await
            .map_err(ImportError::lookup("sites"))
        },
        async {
            fetch_chunked(&client_ids, chunk, |c| async move {
                repo.find_quote_site_hints(&c).await
            })
            .await
            .map_err(ImportError::lookup("quote_hints"))
        },
    )?;

    info!(
        clients = clients.len(),
        sites = sites.len(),
        recipes = recipes.len(),
        prices = prices.len(),
        quote_hints = hints.len(),
        materials = materials.len(),
        existing_remisiones = existing.len(),
        "主数据映射构建完成"
    );

    Ok(LookupMaps::from_parts(
        plant_id,
        clients.into_values().collect(),
        sites,
        recipes,
        prices,
        hints,
        materials,
        existing,
    ))
}
