// ==========================================
// 混凝土站核心 - 配置读取 Trait
// ==========================================
// 职责: 定义校验器与质量汇总所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::SliceOrder;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// PlantConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 说明: 值缺失或格式错误时返回默认值，只有数据库错误才返回 Err
#[async_trait]
pub trait PlantConfigReader: Send + Sync {
    // ===== Arkik 校验配置 =====

    /// 主数据查询分块大小
    ///
    /// # 默认值
    /// - 500
    async fn get_lookup_chunk_size(&self) -> RepositoryResult<usize>;

    /// 配方编码建议的最大条数
    ///
    /// # 默认值
    /// - 3
    async fn get_max_recipe_suggestions(&self) -> RepositoryResult<usize>;

    /// 配方编码建议的最低相似度（0~1）
    ///
    /// # 默认值
    /// - 0.4
    async fn get_suggestion_min_similarity(&self) -> RepositoryResult<f64>;

    // ===== 质量汇总配置 =====

    /// 订单 id 分块大小
    ///
    /// # 默认值
    /// - 500
    async fn get_order_chunk_size(&self) -> RepositoryResult<usize>;

    /// 周切片顺序
    ///
    /// # 默认值
    /// - NEWEST_FIRST
    async fn get_slice_order(&self) -> RepositoryResult<SliceOrder>;

    /// 合规阈值（平均合规率 >= 该值为 compliant）
    ///
    /// # 默认值
    /// - 95.0
    async fn get_compliant_threshold(&self) -> RepositoryResult<f64>;

    /// 待定阈值（平均合规率 >= 该值为 pending）
    ///
    /// # 默认值
    /// - 80.0
    async fn get_pending_threshold(&self) -> RepositoryResult<f64>;
}
