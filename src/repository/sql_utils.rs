// ==========================================
// 混凝土站核心 - SQL 工具模块
// ==========================================
// 职责: IN 子句构建、参数绑定、主键列表分块
// ==========================================

use rusqlite::ToSql;

/// 默认分块大小（单条 IN 子句的最大参数个数）
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// 构建 IN 子句的 SQL 片段
///
/// # 示例
/// ```
/// use concrete_plant::repository::sql_utils::build_in_clause;
///
/// let codes = vec!["FC250".to_string(), "FC300".to_string()];
/// assert_eq!(build_in_clause("recipe_code", &codes), "recipe_code IN (?, ?)");
///
/// // 空列表返回 FALSE 条件
/// let empty: Vec<String> = vec![];
/// assert_eq!(build_in_clause("recipe_code", &empty), "1 = 0");
/// ```
pub fn build_in_clause<T: AsRef<str>>(column_name: &str, values: &[T]) -> String {
    if values.is_empty() {
        // 空列表时返回永假条件，确保 SQL 语法正确
        return "1 = 0".to_string();
    }

    let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    format!("{} IN ({})", column_name, placeholders)
}

/// 将前置参数与 IN 列表拼接为 rusqlite 参数数组
pub fn params_with_list<'a>(
    leading: &[&'a dyn ToSql],
    values: &'a [String],
) -> Vec<&'a dyn ToSql> {
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(leading.len() + values.len());
    params.extend_from_slice(leading);
    for v in values {
        params.push(v);
    }
    params
}

/// 将列表按固定大小分块（chunk_size 为 0 时按默认值处理）
pub fn chunk_values(values: &[String], chunk_size: usize) -> Vec<Vec<String>> {
    let size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };
    values.chunks(size).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_values() {
        let values: Vec<String> = (0..1001).map(|i| i.to_string()).collect();
        let chunks = chunk_values(&values, 500);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 1);

        let chunks = chunk_values(&values, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunk_values(&[], 500).is_empty());
    }

    #[test]
    fn test_params_with_list() {
        let plant = "P1".to_string();
        let values = vec!["a".to_string(), "b".to_string()];
        let params = params_with_list(&[&plant as &dyn ToSql], &values);
        assert_eq!(params.len(), 3);
    }
}
