// ==========================================
// 混凝土站核心 - 配方编码建议
// ==========================================
// 职责: 未匹配配方时给出相似编码候选
// 算法: 归一化 Levenshtein 相似度，子串包含额外加分
// 说明: 排序不是正确性约束，只要求候选合理
// ==========================================

use crate::importer::data_cleaner::normalize_recipe_code;

/// 子串包含时的加分
const CONTAINMENT_BONUS: f64 = 0.2;

/// 相似度打分（0~1）
pub fn similarity(target: &str, candidate: &str) -> f64 {
    let target = normalize_recipe_code(target);
    let candidate = normalize_recipe_code(candidate);
    if target.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let mut score = strsim::normalized_levenshtein(&target, &candidate);
    if candidate.contains(&target) || target.contains(&candidate) {
        score += CONTAINMENT_BONUS;
    }
    score.min(1.0)
}

/// 从已知编码中选出最相似的若干候选
///
/// # 参数
/// - target: 未匹配的编码
/// - known_codes: 已知编码（原样展示）
/// - limit: 最大候选数
/// - min_similarity: 最低相似度
pub fn suggest_codes<'a, I>(target: &str, known_codes: I, limit: usize, min_similarity: f64) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &str)> = known_codes
        .into_iter()
        .map(|code| (similarity(target, code), code))
        .filter(|(score, _)| *score >= min_similarity)
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });

    let mut out: Vec<String> = Vec::with_capacity(limit);
    for (_, code) in scored {
        if out.iter().any(|c| normalize_recipe_code(c) == normalize_recipe_code(code)) {
            continue;
        }
        out.push(code.to_string());
        if out.len() >= limit {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_codes_ranks_closest_first() {
        let known = vec!["FC250-10-28-B", "FC300-10-28-B", "MR45-20-14-N", "FC250-14-28-B"];
        let suggestions = suggest_codes("FC250-10-28-C", known.iter().copied(), 3, 0.4);

        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= 3);
        assert_eq!(suggestions[0], "FC250-10-28-B");
        assert!(!suggestions.contains(&"MR45-20-14-N".to_string()));
    }

    #[test]
    fn test_suggest_codes_respects_limit_and_dedups() {
        let known = vec!["FC250", "fc250", "FC 250", "FC251"];
        let suggestions = suggest_codes("FC25", known.iter().copied(), 2, 0.0);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(
            suggestions
                .iter()
                .filter(|c| normalize_recipe_code(c) == "FC250")
                .count(),
            1
        );
        assert!(suggest_codes("FC25", known.iter().copied(), 0, 0.0).is_empty());
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", "FC250"), 0.0);
        assert!((similarity("fc250", "FC250") - 1.0).abs() < f64::EPSILON);
    }
}
