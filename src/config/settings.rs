// ==========================================
// 混凝土站核心 - 运行参数
// ==========================================
// 职责: 一次性从 PlantConfigReader 读取参数，供引擎同步使用
// ==========================================

use crate::config::plant_config_trait::PlantConfigReader;
use crate::domain::types::SliceOrder;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

/// Arkik 校验参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub lookup_chunk_size: usize,
    pub max_recipe_suggestions: usize,
    pub suggestion_min_similarity: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            lookup_chunk_size: 500,
            max_recipe_suggestions: 3,
            suggestion_min_similarity: 0.4,
        }
    }
}

impl ResolverSettings {
    pub async fn load<C: PlantConfigReader + ?Sized>(config: &C) -> RepositoryResult<Self> {
        Ok(Self {
            lookup_chunk_size: config.get_lookup_chunk_size().await?,
            max_recipe_suggestions: config.get_max_recipe_suggestions().await?,
            suggestion_min_similarity: config.get_suggestion_min_similarity().await?,
        })
    }
}

/// 质量汇总参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    pub order_chunk_size: usize,
    pub slice_order: SliceOrder,
    pub compliant_threshold: f64,
    pub pending_threshold: f64,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            order_chunk_size: 500,
            slice_order: SliceOrder::NewestFirst,
            compliant_threshold: 95.0,
            pending_threshold: 80.0,
        }
    }
}

impl QualitySettings {
    pub async fn load<C: PlantConfigReader + ?Sized>(config: &C) -> RepositoryResult<Self> {
        Ok(Self {
            order_chunk_size: config.get_order_chunk_size().await?,
            slice_order: config.get_slice_order().await?,
            compliant_threshold: config.get_compliant_threshold().await?,
            pending_threshold: config.get_pending_threshold().await?,
        })
    }
}
