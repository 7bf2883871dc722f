// ==========================================
// 混凝土站核心 - 批次校验 Trait
// ==========================================
// 职责: 定义 Arkik 批次校验接口（不包含实现）
// ==========================================

use crate::domain::arkik::{StagingRow, ValidationError, ValidationReport};
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// BatchValidator Trait
// ==========================================
// 实现者: ArkikValidator
#[async_trait]
pub trait BatchValidator: Send + Sync {
    /// 校验一批待导入行
    ///
    /// # 返回
    /// - 校验后的行（与输入同序，状态已填充）
    /// - 全部行级错误的扁平列表
    ///
    /// # 流程
    /// 1. 批量加载主数据映射（一次）
    /// 2. 逐行解析: 客户 → 工地 → 配方 → 价格 → 回填 → 材料 → 重复送货单
    /// 3. 推导状态
    async fn validate_batch(
        &self,
        rows: Vec<StagingRow>,
    ) -> ImportResult<(Vec<StagingRow>, Vec<ValidationError>)>;

    /// 校验并生成批次报告（批次 id、汇总、耗时）
    async fn validate_and_report(&self, rows: Vec<StagingRow>) -> ImportResult<ValidationReport>;
}
