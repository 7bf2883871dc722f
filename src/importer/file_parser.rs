// ==========================================
// 混凝土站核心 - 待导入行读取
// ==========================================
// 输入: Arkik 解析层导出的 JSON 数组（StagingRow）
// 说明: 行号缺失（0）时按 1 起始顺序补齐
// ==========================================

use crate::domain::arkik::StagingRow;
use crate::importer::error::{ImportError, ImportResult};
use std::path::Path;
use tracing::info;

/// 从 JSON 文件读取待导入行
pub fn parse_staging_rows(file_path: &Path) -> ImportResult<Vec<StagingRow>> {
    if !file_path.exists() {
        return Err(ImportError::FileNotFound(file_path.display().to_string()));
    }

    let content = std::fs::read_to_string(file_path)?;
    let rows = parse_staging_json(&content)?;
    info!(path = %file_path.display(), rows = rows.len(), "待导入行读取完成");
    Ok(rows)
}

/// 从 JSON 文本读取待导入行
pub fn parse_staging_json(content: &str) -> ImportResult<Vec<StagingRow>> {
    let mut rows: Vec<StagingRow> = serde_json::from_str(content)?;
    for (idx, row) in rows.iter_mut().enumerate() {
        if row.row_number == 0 {
            row.row_number = idx + 1;
        }
    }
    Ok(rows)
}
