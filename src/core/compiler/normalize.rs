//! Synonym tables mapping human-friendly operator spellings to canonical tokens.

const OPERATOR_SYNONYMS: &[(&str, &[&str])] = &[
    ("==", &["==", "=", "===", "eq", "equals", "equal", "equal_to", "is"]),
    (
        "!=",
        &["!=", "!==", "<>", "ne", "neq", "not_equals", "not_equal", "is_not"],
    ),
    (">", &[">", "gt", "greater_than", "after", "more_than"]),
    (
        ">=",
        &[">=", "gte", "ge", "greater_than_or_equal", "greater_or_equal", "at_least"],
    ),
    ("<", &["<", "lt", "less_than", "before", "fewer_than"]),
    (
        "<=",
        &["<=", "lte", "le", "less_than_or_equal", "less_or_equal", "at_most"],
    ),
    ("contains", &["contains", "includes", "has", "like"]),
    (
        "not_contains",
        &["not_contains", "does_not_contain", "excludes", "not_like"],
    ),
    ("starts_with", &["starts_with", "startswith", "begins_with", "prefix"]),
    ("ends_with", &["ends_with", "endswith", "suffix"]),
    ("in", &["in", "one_of", "any_of", "in_list"]),
    ("not_in", &["not_in", "none_of", "not_in_list"]),
    ("is_empty", &["is_empty", "empty", "is_null", "missing", "not_exists"]),
    (
        "is_not_empty",
        &["is_not_empty", "not_empty", "is_not_null", "exists", "present"],
    ),
    ("matches", &["matches", "regex", "match"]),
];

/// Canonical comparison token for `operator`.
///
/// Unknown operators are returned unchanged; rejecting them is the interpreter's call.
pub fn normalize_operator(operator: &str) -> String {
    let key = operator.trim().to_lowercase().replace([' ', '-'], "_");
    OPERATOR_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&key.as_str()))
        .map(|(canonical, _)| canonical.to_string())
        .unwrap_or_else(|| operator.to_string())
}

/// AI operation types that pick a branch rather than transform data.
const DECISION_TYPES: &[&str] = &["decide", "decision", "classify", "route", "choose", "select"];

pub fn is_decision_type(operation_type: &str) -> bool {
    let key = operation_type.trim().to_lowercase();
    DECISION_TYPES.contains(&key.as_str())
}
