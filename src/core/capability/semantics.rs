//! Fixed vocabulary tables used by the resolution passes.

/// Marker an action's documentation uses to flag itself as the preferred choice.
pub const PREFERRED_MARKER: &str = "preferred";

/// Documentation phrases that discourage selecting an action by its literal name.
pub const DISCOURAGED_PHRASES: &[&str] = &["do not use", "don't use", "only use when"];

const OPERATION_KEYWORDS: &[(&str, &[&str])] = &[
    ("read", &["read", "get", "fetch", "retrieve"]),
    ("write", &["write", "append", "update", "insert"]),
    ("send", &["send", "post", "create", "deliver"]),
    ("search", &["search", "find", "query", "list"]),
    ("list", &["list", "get", "fetch", "search"]),
    ("create", &["create", "add", "insert", "new"]),
    ("update", &["update", "modify", "edit", "patch"]),
    ("delete", &["delete", "remove", "archive"]),
    ("upload", &["upload", "put", "save"]),
    ("download", &["download", "get", "fetch"]),
    ("query", &["query", "select", "search"]),
    ("subscribe", &["subscribe", "listen", "watch"]),
];

const SPECIFIC_QUALIFIERS: &[(&str, &[&str])] = &[
    ("read", &["range", "values", "rows"]),
    ("write", &["rows", "range", "values"]),
    ("send", &["email", "message"]),
    ("search", &["emails", "messages", "records"]),
];

/// An action keyword that satisfies another operation when its documentation agrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticEquivalence {
    pub operation: &'static str,
    pub action_keyword: &'static str,
    pub documentation_keywords: &'static [&'static str],
}

pub const EQUIVALENCES: &[SemanticEquivalence] = &[
    SemanticEquivalence {
        operation: "write",
        action_keyword: "append",
        documentation_keywords: &["adding", "saving", "add", "save"],
    },
    SemanticEquivalence {
        operation: "create",
        action_keyword: "insert",
        documentation_keywords: &["adding", "new"],
    },
    SemanticEquivalence {
        operation: "read",
        action_keyword: "list",
        documentation_keywords: &["reading", "retrieving"],
    },
];

/// Normalize an operation name to the canonical key of the keyword table.
pub fn canonical_operation(operation: &str) -> String {
    let lowered = operation.trim().to_lowercase();
    if OPERATION_KEYWORDS.iter().any(|(op, _)| *op == lowered) {
        return lowered;
    }
    OPERATION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.contains(&lowered.as_str()))
        .map(|(op, _)| op.to_string())
        .unwrap_or(lowered)
}

/// Keyword set for an operation type; unknown operations match only themselves.
pub fn operation_keywords(operation: &str) -> Vec<String> {
    let canonical = canonical_operation(operation);
    OPERATION_KEYWORDS
        .iter()
        .find(|(op, _)| *op == canonical)
        .map(|(_, keywords)| keywords.iter().map(|kw| kw.to_string()).collect())
        .unwrap_or_else(|| vec![canonical])
}

pub fn specific_qualifiers(operation: &str) -> &'static [&'static str] {
    let canonical = canonical_operation(operation);
    SPECIFIC_QUALIFIERS
        .iter()
        .find(|(op, _)| *op == canonical)
        .map(|(_, qualifiers)| *qualifiers)
        .unwrap_or(&[])
}

pub fn equivalences(operation: &str) -> impl Iterator<Item = &'static SemanticEquivalence> {
    let canonical = canonical_operation(operation);
    EQUIVALENCES
        .iter()
        .filter(move |equivalence| equivalence.operation == canonical)
}
