// ==========================================
// 混凝土站核心 - 质量数据 Repository Trait
// ==========================================
// 职责: 定义质量汇总所需的只读查询
// ==========================================

use crate::domain::quality::RemisionRecord;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// QualityRepository Trait
// ==========================================
// 实现者: QualityRepositoryImpl（rusqlite）
#[async_trait]
pub trait QualityRepository: Send + Sync {
    /// 查询客户在日期范围内（按交货日期，闭区间）的订单 id
    async fn find_order_ids_for_client(
        &self,
        client_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<String>>;

    /// 查询订单下送货日期落在窗口内（闭区间）且方量非空的送货单
    ///
    /// 结果包含嵌套的取样/试件/试验以及材料实耗
    async fn find_remisiones_in_window(
        &self,
        order_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<RemisionRecord>>;
}
