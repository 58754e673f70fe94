use super::scope::{step_references, WorkflowScan};
use super::ValidationIssue;
use crate::core::config::ValidatorSettings;
use crate::core::registry::PluginRegistry;
use intentflow_types::{StepKind, WorkflowStep};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Inputs shared by every check.
pub struct CheckContext<'a> {
    pub registry: Option<&'a PluginRegistry>,
    pub settings: &'a ValidatorSettings,
}

/// Trait implemented by the post-compilation checks.
pub trait WorkflowCheck: Send + Sync {
    fn check(&self, scan: &WorkflowScan<'_>, ctx: &CheckContext<'_>) -> Vec<ValidationIssue>;
}

pub struct StepTypeCheck;

impl WorkflowCheck for StepTypeCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        scan.steps
            .iter()
            .filter_map(|scanned| match &scanned.step.kind {
                StepKind::Unknown(raw) => Some(ValidationIssue::error(
                    &scanned.step.step_id,
                    "INVALID_STEP_TYPE",
                    format!("step type '{}' is not a workflow step type", raw),
                    Some(step_type_hint(raw)),
                )),
                _ => None,
            })
            .collect()
    }
}

fn step_type_hint(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "ai_call" | "ai" | "llm" | "llm_call" | "ai_step" | "gpt" => {
            "use 'ai_processing' for data processing or 'llm_decision' for branching".to_string()
        }
        "api_call" | "query" | "http" | "plugin" | "plugin_action" | "request" => {
            "use 'action' with a plugin and action name".to_string()
        }
        _ => {
            let known: Vec<&str> = StepKind::KNOWN.iter().map(StepKind::as_str).collect();
            format!("use one of: {}", known.join(", "))
        }
    }
}

pub struct ConditionPresenceCheck;

impl WorkflowCheck for ConditionPresenceCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        scan.steps
            .iter()
            .filter(|scanned| scanned.step.kind == StepKind::Conditional)
            .filter(|scanned| scanned.step.condition.as_ref().map_or(true, Value::is_null))
            .map(|scanned| {
                ValidationIssue::error(
                    &scanned.step.step_id,
                    "MISSING_CONDITION",
                    "conditional step has no condition",
                    Some("add a condition object ({type: simple, field, operator, value})".to_string()),
                )
            })
            .collect()
    }
}

/// Location of a transform-like blob embedded in action params.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedTransform {
    pub path: Vec<PathSegment>,
    /// `expression` blobs become `map`, `condition` blobs become `filter`.
    pub has_expression: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl EmbeddedTransform {
    pub fn display_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) if out.is_empty() => out.push_str(key),
                PathSegment::Key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
            }
        }
        out
    }
}

/// Objects carrying `expression` or `condition` keys anywhere in `params`.
pub fn embedded_transforms(params: &Map<String, Value>) -> Vec<EmbeddedTransform> {
    fn walk(value: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<EmbeddedTransform>) {
        match value {
            Value::Object(map) => {
                let has_expression = map.contains_key("expression");
                if has_expression || map.contains_key("condition") {
                    out.push(EmbeddedTransform {
                        path: path.clone(),
                        has_expression,
                    });
                    return;
                }
                for (key, child) in map {
                    path.push(PathSegment::Key(key.clone()));
                    walk(child, path, out);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    walk(child, path, out);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for (key, value) in params {
        let mut path = vec![PathSegment::Key(key.clone())];
        walk(value, &mut path, &mut out);
    }
    out
}

pub struct EmbeddedTransformCheck;

impl WorkflowCheck for EmbeddedTransformCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for scanned in scan.steps.iter().filter(|s| s.step.kind == StepKind::Action) {
            for embedded in embedded_transforms(&scanned.step.params) {
                let kind = if embedded.has_expression {
                    "expression"
                } else {
                    "condition"
                };
                out.push(
                    ValidationIssue::error(
                        &scanned.step.step_id,
                        "TRANSFORM_BEFORE_ACTION",
                        format!(
                            "action param '{}' embeds a {} object; actions take resolved values",
                            embedded.display_path(),
                            kind
                        ),
                        Some("move the computation into a transform step before the action".to_string()),
                    )
                    .fixable(),
                );
            }
        }
        out
    }
}

pub struct TransformInputCheck;

impl WorkflowCheck for TransformInputCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        scan.steps
            .iter()
            .filter(|scanned| scanned.step.kind == StepKind::Transform)
            .filter(|scanned| {
                scanned
                    .step
                    .input
                    .as_deref()
                    .map_or(true, |input| input.trim().is_empty())
            })
            .map(|scanned| {
                ValidationIssue::error(
                    &scanned.step.step_id,
                    "MISSING_TRANSFORM_INPUT",
                    "transform step declares no input",
                    Some("set input to the {{variable}} the transform reads".to_string()),
                )
            })
            .collect()
    }
}

pub struct VariableScopeCheck;

impl WorkflowCheck for VariableScopeCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for scanned in &scan.steps {
            let mut reported = HashSet::new();
            for reference in step_references(scanned.step) {
                if reference.is_expression() {
                    continue;
                }
                let root = reference.root().to_string();
                if scanned.visible.contains(&root) || !reported.insert(root.clone()) {
                    continue;
                }
                let suggestion = if scan.known_names.contains(&root) {
                    format!("'{}' is produced later or in another scope; reorder the steps", root)
                } else {
                    "reference a prior step output or the enclosing iterator variable".to_string()
                };
                out.push(ValidationIssue::error(
                    &scanned.step.step_id,
                    "UNRESOLVED_VARIABLE",
                    format!("reference '{{{{{}}}}}' does not resolve in this scope", reference.raw),
                    Some(suggestion),
                ));
            }
        }
        out
    }
}

pub struct PluginSchemaCheck;

impl WorkflowCheck for PluginSchemaCheck {
    fn check(&self, scan: &WorkflowScan<'_>, ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let Some(registry) = ctx.registry else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for scanned in scan.steps.iter().filter(|s| s.step.kind == StepKind::Action) {
            let step = scanned.step;
            let Some(plugin_key) = step.plugin.as_deref() else {
                out.push(ValidationIssue::error(
                    &step.step_id,
                    "UNKNOWN_PLUGIN",
                    "action step declares no plugin",
                    Some(format!("use one of: {}", registry.keys().join(", "))),
                ));
                continue;
            };
            let Some(plugin) = registry.get(plugin_key) else {
                out.push(ValidationIssue::error(
                    &step.step_id,
                    "UNKNOWN_PLUGIN",
                    format!("plugin '{}' is not registered", plugin_key),
                    Some(format!("use one of: {}", registry.keys().join(", "))),
                ));
                continue;
            };
            let action_name = step.action.as_deref().unwrap_or_default();
            let Some(action) = plugin.action(action_name) else {
                out.push(ValidationIssue::error(
                    &step.step_id,
                    "UNKNOWN_ACTION",
                    format!("plugin '{}' has no action '{}'", plugin_key, action_name),
                    Some(format!(
                        "use one of: {}",
                        plugin.action_names().collect::<Vec<_>>().join(", ")
                    )),
                ));
                continue;
            };
            for required in action.required_parameters() {
                if step.params.get(required).map_or(true, Value::is_null) {
                    out.push(ValidationIssue::error(
                        &step.step_id,
                        "MISSING_REQUIRED_PARAM",
                        format!(
                            "{}.{} requires parameter '{}'",
                            plugin_key, action_name, required
                        ),
                        None,
                    ));
                }
            }
        }
        out
    }
}

pub struct IteratorDeclarationCheck;

impl WorkflowCheck for IteratorDeclarationCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        scan.steps
            .iter()
            .filter(|scanned| scanned.step.kind == StepKind::ScatterGather)
            .filter(|scanned| scanned.step.declared_item_variable().is_none())
            .map(|scanned| {
                let inferred = scan
                    .frames
                    .iter()
                    .find(|frame| {
                        frame
                            .owner
                            .is_some_and(|owner| std::ptr::eq(owner, scanned.step))
                    })
                    .and_then(|frame| frame.iterator.clone());
                let suggestion = match inferred {
                    Some(name) => format!("declare itemVariable explicitly (inferred '{}')", name),
                    None => "declare itemVariable explicitly".to_string(),
                };
                ValidationIssue::warning(
                    &scanned.step.step_id,
                    "MISSING_ITERATOR_VARIABLE",
                    "scatter_gather step does not declare an itemVariable",
                    Some(suggestion),
                )
            })
            .collect()
    }
}

const ARRAY_ONLY_MEMBERS: &str =
    "length|filter|includes|map|reduce|some|every|find|findIndex|indexOf|slice|forEach|join|concat|push|flat";

fn returns_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\?|:)\s*\[").expect("array return pattern compiles"))
}

pub struct MapLogicCheck;

impl MapLogicCheck {
    fn expression(step: &WorkflowStep) -> Option<&str> {
        step.config
            .get("expression")
            .or_else(|| step.params.get("expression"))
            .and_then(Value::as_str)
    }

    fn item_names(step: &WorkflowStep, enclosing: Option<&str>) -> Vec<String> {
        let declared = step
            .config
            .get("item_variable")
            .or_else(|| step.config.get("itemVariable"))
            .and_then(Value::as_str)
            .or(step.item_variable.as_deref())
            .unwrap_or("item");
        let mut names = vec![declared.to_string()];
        if let Some(name) = enclosing {
            if name != declared {
                names.push(name.to_string());
            }
        }
        names
    }
}

impl WorkflowCheck for MapLogicCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        let returns_array = returns_array_pattern();
        for scanned in &scan.steps {
            let step = scanned.step;
            if step.kind != StepKind::Transform || step.operation.as_deref() != Some("map") {
                continue;
            }
            let Some(expression) = Self::expression(step) else {
                continue;
            };
            for name in Self::item_names(step, scanned.enclosing_iterator.as_deref()) {
                let pattern = format!(r"\b{}\s*\.\s*({})\b", regex::escape(&name), ARRAY_ONLY_MEMBERS);
                let Ok(misuse) = Regex::new(&pattern) else {
                    continue;
                };
                if let Some(found) = misuse.captures(expression).and_then(|caps| caps.get(1)) {
                    out.push(ValidationIssue::error(
                        &step.step_id,
                        "INVALID_MAP_LOGIC",
                        format!(
                            "map expression applies array operation '.{}' to '{}', which is a single element",
                            found.as_str(),
                            name
                        ),
                        Some("operate on the element's fields, or use a filter/aggregate transform on the collection".to_string()),
                    ));
                    break;
                }
            }
            if expression.contains('?') && returns_array.is_match(expression) {
                out.push(ValidationIssue::warning(
                    &step.step_id,
                    "MAP_RETURNS_ARRAY",
                    "map expression returns an array from a conditional; this looks like a filter",
                    Some("use a filter transform to keep or drop elements".to_string()),
                ));
            }
        }
        out
    }
}

pub struct DependencyCheck;

impl WorkflowCheck for DependencyCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for scanned in &scan.steps {
            let step = scanned.step;
            let Some(dependencies) = &step.dependencies else {
                out.push(
                    ValidationIssue::error(
                        &step.step_id,
                        "MISSING_DEPENDENCIES",
                        "step does not declare a dependencies array",
                        Some("add dependencies: [] or list the step ids it needs".to_string()),
                    )
                    .fixable(),
                );
                continue;
            };
            for dependency in dependencies {
                if !scanned.dependency_ids.contains(dependency) {
                    out.push(ValidationIssue::error(
                        &step.step_id,
                        "UNKNOWN_DEPENDENCY",
                        format!("dependency '{}' is not a step in scope", dependency),
                        None,
                    ));
                    continue;
                }
                if let Some(position) = scan.index_in_frame(scanned.frame, dependency) {
                    if position >= scanned.index {
                        out.push(ValidationIssue::warning(
                            &step.step_id,
                            "FORWARD_DEPENDENCY",
                            format!("dependency '{}' is declared at or after this step", dependency),
                            Some("move the dependency before the step that needs it".to_string()),
                        ));
                    }
                }
            }
        }
        out
    }
}

pub struct DuplicateIdCheck;

impl WorkflowCheck for DuplicateIdCheck {
    fn check(&self, scan: &WorkflowScan<'_>, _ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for frame in &scan.frames {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for step in frame.steps {
                *counts.entry(step.step_id.as_str()).or_insert(0) += 1;
            }
            for (step_id, count) in counts.into_iter().filter(|(_, count)| *count > 1) {
                out.push(ValidationIssue::error(
                    step_id,
                    "DUPLICATE_STEP_ID",
                    format!("step id '{}' appears {} times in the same scope", step_id, count),
                    Some("rename steps so ids are unique within each scope".to_string()),
                ));
            }
        }
        out
    }
}

/// True cycle detection over dependency edges; runs only when enabled.
pub struct DependencyCycleCheck;

impl WorkflowCheck for DependencyCycleCheck {
    fn check(&self, scan: &WorkflowScan<'_>, ctx: &CheckContext<'_>) -> Vec<ValidationIssue> {
        if !ctx.settings.detect_cycles {
            return Vec::new();
        }
        let mut out = Vec::new();
        for frame in &scan.frames {
            let (graph, ids) = dependency_graph(frame.steps);
            for component in tarjan_scc(&graph) {
                let is_cycle = component.len() > 1
                    || graph.find_edge(component[0], component[0]).is_some();
                if !is_cycle {
                    continue;
                }
                let mut members: Vec<&str> = component
                    .iter()
                    .filter_map(|idx| ids.get(idx).map(String::as_str))
                    .collect();
                members.sort_unstable();
                if let Some(first) = members.first() {
                    out.push(ValidationIssue::error(
                        *first,
                        "DEPENDENCY_CYCLE",
                        format!("dependency cycle between steps: {}", members.join(" -> ")),
                        Some("break the cycle by removing one of the dependencies".to_string()),
                    ));
                }
            }
        }
        out
    }
}

fn dependency_graph(steps: &[WorkflowStep]) -> (DiGraph<(), ()>, HashMap<NodeIndex, String>) {
    let mut graph = DiGraph::<(), ()>::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();
    let mut ids = HashMap::new();
    for step in steps {
        if node_map.contains_key(step.step_id.as_str()) {
            continue;
        }
        let idx = graph.add_node(());
        node_map.insert(step.step_id.as_str(), idx);
        ids.insert(idx, step.step_id.clone());
    }
    for step in steps {
        let Some(&to) = node_map.get(step.step_id.as_str()) else {
            continue;
        };
        for dependency in step.dependencies.iter().flatten() {
            if let Some(&from) = node_map.get(dependency.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, ids)
}
