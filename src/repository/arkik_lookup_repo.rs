// ==========================================
// 混凝土站核心 - Arkik 主数据查询 Repository Trait
// ==========================================
// 职责: 定义校验器构建映射所需的只读查询（不包含业务逻辑）
// 红线: 只读，不写入任何表
// ==========================================

use crate::domain::arkik::{Client, ConstructionSite, ProductPrice, QuoteSiteHint, Recipe};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ArkikLookupRepository Trait
// ==========================================
// 实现者: ArkikLookupRepositoryImpl（rusqlite）
// 说明: 列表参数由调用方分块，单次调用不超过分块大小
#[async_trait]
pub trait ArkikLookupRepository: Send + Sync {
    /// 按小写编码或小写名称查询客户
    async fn find_clients_by_code_or_name(
        &self,
        lower_codes: &[String],
        lower_names: &[String],
    ) -> RepositoryResult<Vec<Client>>;

    /// 按 id 查询客户
    async fn find_clients_by_ids(&self, client_ids: &[String]) -> RepositoryResult<Vec<Client>>;

    /// 查询客户名下的工地
    async fn find_sites_by_client_ids(
        &self,
        client_ids: &[String],
    ) -> RepositoryResult<Vec<ConstructionSite>>;

    /// 查询工厂的全部配方（同时用于编码建议）
    async fn find_recipes_by_plant(&self, plant_id: &str) -> RepositoryResult<Vec<Recipe>>;

    /// 按规范化配方编码查询有效价格（跨工厂）
    ///
    /// 返回的 `code` 为规范化后的配方编码
    async fn find_active_prices_by_recipe_codes(
        &self,
        normalized_codes: &[String],
    ) -> RepositoryResult<Vec<ProductPrice>>;

    /// 查询已批准报价中的工地提示
    async fn find_quote_site_hints(
        &self,
        client_ids: &[String],
    ) -> RepositoryResult<Vec<QuoteSiteHint>>;

    /// 查询工厂已映射的材料编码
    async fn find_mapped_material_codes(&self, plant_id: &str) -> RepositoryResult<Vec<String>>;

    /// 查询工厂已存在的送货单号
    async fn find_existing_remision_numbers(
        &self,
        plant_id: &str,
        remision_numbers: &[String],
    ) -> RepositoryResult<Vec<String>>;
}
