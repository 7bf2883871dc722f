// ==========================================
// 混凝土站核心 - 导入校验错误类型
// ==========================================
// 说明: 行级问题不在此处，统一落为 ValidationError 挂在行上
//       这里只描述会中止整个批次的错误
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入校验错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 主数据加载 =====
    #[error("主数据查询失败 ({stage}): {source}")]
    LookupFailed {
        stage: &'static str,
        #[source]
        source: RepositoryError,
    },

    // ===== 配置错误 =====
    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ===== 输入错误 =====
    #[error("工厂 ID 不能为空")]
    MissingPlantId,

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("待导入行解析失败: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn lookup(stage: &'static str) -> impl FnOnce(RepositoryError) -> ImportError {
        move |source| ImportError::LookupFailed { stage, source }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
