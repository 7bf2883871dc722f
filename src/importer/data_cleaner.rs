// ==========================================
// 混凝土站核心 - 数据清洗
// ==========================================
// 职责: 编码/名称规范化（TRIM / 大小写 / 空白），作为所有匹配的唯一口径
// ==========================================

/// 配方编码规范化：去掉 ASCII 空白（空格、\t、\n、\x0C、\r）并转 ASCII 大写
///
/// 与 SQL 侧 `NORMALIZED_RECIPE_CODE` 逐字符一致。
///
/// ```
/// use concrete_plant::importer::data_cleaner::normalize_recipe_code;
/// assert_eq!(normalize_recipe_code(" fc250-10 28-b "), "FC250-1028-B");
/// ```
pub fn normalize_recipe_code(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// 名称规范化：TRIM + 小写（与 SQL 的 LOWER(TRIM(x)) 对齐）
pub fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 材料编码规范化：TRIM + 大写
pub fn normalize_material_code(value: &str) -> String {
    value.trim().to_uppercase()
}

/// 标准化 NULL 值（空字符串/空白 → None）
pub fn normalize_null(value: Option<&str>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
