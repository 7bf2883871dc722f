// ==========================================
// 混凝土站核心 - 领域类型定义
// ==========================================
// 职责: 校验状态、错误类型、价格来源、质量状态等枚举
// 序列化格式与数据库/前端保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 校验状态 (Validation Status)
// ==========================================
// 优先级: Error > Warning > Valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending, // 未校验
    Valid,   // 通过
    Warning, // 可恢复问题（人工修正后可导入）
    Error,   // 阻断导入
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Pending => write!(f, "pending"),
            ValidationStatus::Valid => write!(f, "valid"),
            ValidationStatus::Warning => write!(f, "warning"),
            ValidationStatus::Error => write!(f, "error"),
        }
    }
}

impl Default for ValidationStatus {
    fn default() -> Self {
        ValidationStatus::Pending
    }
}

// ==========================================
// 校验错误类型 (Validation Error Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationErrorKind {
    ClientNotFound,     // 客户未匹配
    SiteNotFound,       // 工地未匹配
    RecipeNotFound,     // 配方未匹配
    RecipeHasNoPrice,   // 配方无有效价格
    MaterialNotMapped,  // 材料编码未映射
    DuplicateRemision,  // 送货单重复（不可恢复）
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::ClientNotFound => "client-not-found",
            ValidationErrorKind::SiteNotFound => "site-not-found",
            ValidationErrorKind::RecipeNotFound => "recipe-not-found",
            ValidationErrorKind::RecipeHasNoPrice => "recipe-has-no-price",
            ValidationErrorKind::MaterialNotMapped => "material-not-mapped",
            ValidationErrorKind::DuplicateRemision => "duplicate-remision",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 价格来源 (Price Source)
// ==========================================
// 优先级: ClientSite > Client > Plant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    ClientSite, // 客户 + 工地
    Client,     // 仅客户
    Plant,      // 工厂级
    None,       // 未定价
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::ClientSite => write!(f, "client_site"),
            PriceSource::Client => write!(f, "client"),
            PriceSource::Plant => write!(f, "plant"),
            PriceSource::None => write!(f, "none"),
        }
    }
}

impl Default for PriceSource {
    fn default() -> Self {
        PriceSource::None
    }
}

// ==========================================
// 合规状态 (Compliance Status)
// ==========================================
// 阈值默认: >=95 compliant, >=80 pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Pending,
    NonCompliant,
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceStatus::Compliant => write!(f, "compliant"),
            ComplianceStatus::Pending => write!(f, "pending"),
            ComplianceStatus::NonCompliant => write!(f, "non_compliant"),
        }
    }
}

// ==========================================
// 切片顺序 (Slice Order)
// ==========================================
// 默认 NEWEST_FIRST: 首个切片即为最近一周
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceOrder {
    NewestFirst,
    OldestFirst,
}

impl fmt::Display for SliceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl SliceOrder {
    /// 从字符串解析（未知值回退为 NEWEST_FIRST）
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "OLDEST_FIRST" | "OLDEST" => SliceOrder::OldestFirst,
            _ => SliceOrder::NewestFirst,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SliceOrder::NewestFirst => "NEWEST_FIRST",
            SliceOrder::OldestFirst => "OLDEST_FIRST",
        }
    }
}

impl Default for SliceOrder {
    fn default() -> Self {
        SliceOrder::NewestFirst
    }
}

// ==========================================
// 质量趋势 (Quality Trend)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    Improving,
    Declining,
    Stable,
}

impl fmt::Display for QualityTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTrend::Improving => write!(f, "improving"),
            QualityTrend::Declining => write!(f, "declining"),
            QualityTrend::Stable => write!(f, "stable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ValidationErrorKind::RecipeHasNoPrice).unwrap();
        assert_eq!(json, "\"recipe-has-no-price\"");
        assert_eq!(
            ValidationErrorKind::DuplicateRemision.to_string(),
            "duplicate-remision"
        );
    }

    #[test]
    fn test_slice_order_from_str() {
        assert_eq!(SliceOrder::from_str("oldest_first"), SliceOrder::OldestFirst);
        assert_eq!(SliceOrder::from_str(" OLDEST "), SliceOrder::OldestFirst);
        assert_eq!(SliceOrder::from_str("whatever"), SliceOrder::NewestFirst);
    }

    #[test]
    fn test_price_source_display() {
        assert_eq!(PriceSource::ClientSite.to_string(), "client_site");
        assert_eq!(PriceSource::default(), PriceSource::None);
    }
}
