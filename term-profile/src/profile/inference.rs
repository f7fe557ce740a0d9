//! Semantic type inference from engine summaries.
//!
//! Inference is a pure function of one [`ColumnSummary`]; rules are tried in a
//! fixed order and the first match wins.

use crate::engine::{ColumnSummary, DeclaredKind};
use crate::profile::types::SemanticType;

/// Distinct ratio above which an integer column is treated as an identifier.
const ID_UNIQUENESS: f64 = 0.95;

/// Minimum rows before uniqueness alone marks an integer column as an id.
const ID_MIN_ROWS: u64 = 20;

/// Numeric columns with at most this many distinct values may be categorical.
const NUMERIC_CATEGORICAL_MAX_DISTINCT: u64 = 10;

/// ...but only when the table has more rows than this.
const NUMERIC_CATEGORICAL_MIN_ROWS: u64 = 100;

/// String columns under this distinct ratio are categorical.
const STRING_CATEGORICAL_RATIO: f64 = 0.05;

/// String columns with at most this many distinct values are categorical.
const STRING_CATEGORICAL_MAX_DISTINCT: u64 = 50;

/// Infers the semantic type of a column.
///
/// # Examples
///
/// ```rust
/// use term_profile::engine::{ColumnSummary, DeclaredKind};
/// use term_profile::profile::{infer_semantic_type, SemanticType};
///
/// let summary = ColumnSummary {
///     name: "country".into(),
///     declared_type: "Utf8".into(),
///     declared_kind: DeclaredKind::Text,
///     row_count: 1000,
///     non_null_count: 1000,
///     distinct_count: 12,
///     min: None,
///     max: None,
///     mean: None,
///     std_dev: None,
///     q25: None,
///     median: None,
///     q75: None,
///     null_fraction: 0.0,
/// };
/// assert_eq!(infer_semantic_type(&summary), SemanticType::Categorical);
/// ```
pub fn infer_semantic_type(summary: &ColumnSummary) -> SemanticType {
    let kind = match summary.declared_kind {
        DeclaredKind::Other => DeclaredKind::from_type_name(&summary.declared_type),
        kind => kind,
    };

    if is_id_name(&summary.name)
        || (kind == DeclaredKind::Integer
            && summary.row_count >= ID_MIN_ROWS
            && summary.distinct_ratio() > ID_UNIQUENESS)
    {
        return SemanticType::Id;
    }

    match kind {
        DeclaredKind::Boolean => SemanticType::Boolean,
        DeclaredKind::Temporal => SemanticType::DateTime,
        DeclaredKind::Integer | DeclaredKind::Float => {
            if summary.distinct_count <= NUMERIC_CATEGORICAL_MAX_DISTINCT
                && summary.row_count > NUMERIC_CATEGORICAL_MIN_ROWS
            {
                SemanticType::Categorical
            } else {
                SemanticType::Numeric
            }
        }
        DeclaredKind::Text => {
            if summary.distinct_ratio() < STRING_CATEGORICAL_RATIO
                || summary.distinct_count <= STRING_CATEGORICAL_MAX_DISTINCT
            {
                SemanticType::Categorical
            } else {
                SemanticType::Text
            }
        }
        DeclaredKind::Other => SemanticType::Unknown,
    }
}

/// True when a column name marks an identifier.
///
/// Matches `id`, `*_id`, `*-id`, `* id`, camel-case `fooId`/`fooID`, and any
/// name containing `uuid` or `guid`.
pub fn is_id_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower == "id"
        || lower.ends_with("_id")
        || lower.ends_with("-id")
        || lower.ends_with(" id")
        || lower.contains("uuid")
        || lower.contains("guid")
    {
        return true;
    }
    // camelCase suffix: a lowercase letter followed by "Id" or "ID".
    let bytes = name.as_bytes();
    bytes.len() > 2
        && (name.ends_with("Id") || name.ends_with("ID"))
        && bytes[bytes.len() - 3].is_ascii_lowercase()
}

/// Name fragments of columns that hold personally identifying data.
const PII_NAME_MARKERS: &[&str] = &[
    "email",
    "e_mail",
    "phone",
    "mobile",
    "ssn",
    "social_security",
    "passport",
    "credit_card",
    "card_number",
    "iban",
    "tax_id",
    "ip_address",
    "street",
    "address",
    "birth",
    "dob",
    "license",
];

/// True when the column name suggests personally identifying data.
pub fn is_pii_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PII_NAME_MARKERS.iter().any(|m| lower.contains(m))
}

/// True when the column name suggests a person's name.
pub fn is_person_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase().replace(['-', ' '], "_");
    if matches!(lower.as_str(), "name" | "surname" | "forename" | "username") {
        return true;
    }
    lower.ends_with("name")
        && [
            "first", "last", "full", "given", "family", "middle", "person", "customer",
            "contact", "user", "employee", "owner", "author", "patient",
        ]
        .iter()
        .any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, kind: DeclaredKind, rows: u64, distinct: u64) -> ColumnSummary {
        ColumnSummary {
            name: name.to_string(),
            declared_type: format!("{kind:?}"),
            declared_kind: kind,
            row_count: rows,
            non_null_count: rows,
            distinct_count: distinct,
            min: None,
            max: None,
            mean: None,
            std_dev: None,
            q25: None,
            median: None,
            q75: None,
            null_fraction: 0.0,
        }
    }

    #[test]
    fn test_id_by_name() {
        for name in ["id", "customer_id", "order-id", "userId", "accountID", "row_uuid", "GUID"] {
            assert_eq!(
                infer_semantic_type(&summary(name, DeclaredKind::Text, 100, 3)),
                SemanticType::Id,
                "{name}"
            );
        }
        assert!(!is_id_name("paid"));
        assert!(!is_id_name("valid"));
        assert!(!is_id_name("ID_card"));
    }

    #[test]
    fn test_id_by_uniqueness() {
        let s = summary("sequence", DeclaredKind::Integer, 1000, 990);
        assert_eq!(infer_semantic_type(&s), SemanticType::Id);

        let floats = summary("price", DeclaredKind::Float, 1000, 990);
        assert_eq!(infer_semantic_type(&floats), SemanticType::Numeric);

        let small = summary("value", DeclaredKind::Integer, 5, 5);
        assert_eq!(infer_semantic_type(&small), SemanticType::Numeric);
    }

    #[test]
    fn test_boolean_and_datetime() {
        assert_eq!(
            infer_semantic_type(&summary("active", DeclaredKind::Boolean, 100, 2)),
            SemanticType::Boolean
        );
        assert_eq!(
            infer_semantic_type(&summary("created", DeclaredKind::Temporal, 100, 90)),
            SemanticType::DateTime
        );
    }

    #[test]
    fn test_numeric_vs_categorical() {
        assert_eq!(
            infer_semantic_type(&summary("rating", DeclaredKind::Integer, 500, 5)),
            SemanticType::Categorical
        );
        // Too few rows for low cardinality to mean categories.
        assert_eq!(
            infer_semantic_type(&summary("rating", DeclaredKind::Integer, 50, 5)),
            SemanticType::Numeric
        );
        assert_eq!(
            infer_semantic_type(&summary("amount", DeclaredKind::Float, 500, 300)),
            SemanticType::Numeric
        );
    }

    #[test]
    fn test_string_rules() {
        assert_eq!(
            infer_semantic_type(&summary("city", DeclaredKind::Text, 100_000, 3_000)),
            SemanticType::Categorical
        );
        assert_eq!(
            infer_semantic_type(&summary("city", DeclaredKind::Text, 100, 50)),
            SemanticType::Categorical
        );
        assert_eq!(
            infer_semantic_type(&summary("comment", DeclaredKind::Text, 1000, 800)),
            SemanticType::Text
        );
    }

    #[test]
    fn test_type_name_fallback() {
        let mut s = summary("blob", DeclaredKind::Other, 10, 10);
        s.declared_type = "List(Int64)".into();
        assert_eq!(infer_semantic_type(&s), SemanticType::Numeric);
        s.declared_type = "Struct".into();
        assert_eq!(infer_semantic_type(&s), SemanticType::Unknown);
    }

    #[test]
    fn test_name_hints() {
        assert!(is_pii_name("contact_email"));
        assert!(is_pii_name("Phone"));
        assert!(!is_pii_name("amount"));
        assert!(is_person_name("first_name"));
        assert!(is_person_name("Customer Name"));
        assert!(is_person_name("name"));
        assert!(!is_person_name("product_name"));
    }
}
