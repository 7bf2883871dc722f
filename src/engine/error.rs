// ==========================================
// 混凝土站核心 - 质量汇总错误类型
// ==========================================
// 说明: 只描述加载前置步骤的失败；单个周切片的查询失败只记录日志
// ==========================================

use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("日期范围无效: {from} > {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("客户 ID 不能为空")]
    MissingClientId,

    #[error("订单查询失败 (client_id={client_id}): {source}")]
    OrdersLookup {
        client_id: String,
        #[source]
        source: RepositoryError,
    },

    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type QualityResult<T> = Result<T, QualityError>;
