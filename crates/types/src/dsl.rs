//! Workflow DSL consumed by the downstream step interpreter.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Step kind. Unrecognised kinds are kept verbatim so validation can name them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Action,
    Transform,
    Conditional,
    Loop,
    ScatterGather,
    AiProcessing,
    LlmDecision,
    Switch,
    Delay,
    Enrichment,
    Validation,
    Comparison,
    SubWorkflow,
    HumanApproval,
    Trigger,
    Unknown(String),
}

impl StepKind {
    /// Every kind the interpreter understands.
    pub const KNOWN: [StepKind; 15] = [
        StepKind::Action,
        StepKind::Transform,
        StepKind::Conditional,
        StepKind::Loop,
        StepKind::ScatterGather,
        StepKind::AiProcessing,
        StepKind::LlmDecision,
        StepKind::Switch,
        StepKind::Delay,
        StepKind::Enrichment,
        StepKind::Validation,
        StepKind::Comparison,
        StepKind::SubWorkflow,
        StepKind::HumanApproval,
        StepKind::Trigger,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Action => "action",
            StepKind::Transform => "transform",
            StepKind::Conditional => "conditional",
            StepKind::Loop => "loop",
            StepKind::ScatterGather => "scatter_gather",
            StepKind::AiProcessing => "ai_processing",
            StepKind::LlmDecision => "llm_decision",
            StepKind::Switch => "switch",
            StepKind::Delay => "delay",
            StepKind::Enrichment => "enrichment",
            StepKind::Validation => "validation",
            StepKind::Comparison => "comparison",
            StepKind::SubWorkflow => "sub_workflow",
            StepKind::HumanApproval => "human_approval",
            StepKind::Trigger => "trigger",
            StepKind::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StepKind::Unknown(_))
    }
}

impl From<String> for StepKind {
    fn from(value: String) -> Self {
        StepKind::KNOWN
            .iter()
            .find(|kind| kind.as_str() == value)
            .cloned()
            .unwrap_or(StepKind::Unknown(value))
    }
}

impl From<StepKind> for String {
    fn from(value: StepKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan-out block of a `scatter_gather` step, written into its `config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScatterGather {
    pub input: String,
    #[serde(
        rename = "itemVariable",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub item_variable: Option<String>,
    #[serde(
        rename = "maxConcurrency",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_concurrency: Option<u32>,
    #[serde(default)]
    pub actions: Vec<WorkflowStep>,
}

/// One executable step of a compiled workflow.
///
/// On the wire, scatter-gather fan-out (`input`, `itemVariable`, `maxConcurrency`,
/// `actions`) and conditional branches (`then_steps`, `else_steps`) live inside
/// `config`. The older top-level `scatter` block and branch lists are still read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct WorkflowStep {
    pub step_id: String,
    pub kind: StepKind,
    pub plugin: Option<String>,
    pub action: Option<String>,
    pub operation: Option<String>,
    pub input: Option<String>,
    pub condition: Option<Value>,
    pub params: Map<String, Value>,
    /// Operation config without the nested-step keys.
    pub config: Map<String, Value>,
    pub scatter: Option<ScatterGather>,
    pub loop_steps: Vec<WorkflowStep>,
    pub item_variable: Option<String>,
    pub then_steps: Vec<WorkflowStep>,
    pub else_steps: Vec<WorkflowStep>,
    pub dependencies: Option<Vec<String>>,
    pub output_variable: Option<String>,
    pub description: String,
}

const SCATTER_INPUT: &str = "input";
const SCATTER_ITEM: &str = "itemVariable";
const SCATTER_CONCURRENCY: &str = "maxConcurrency";
const SCATTER_ACTIONS: &str = "actions";
const THEN_STEPS: &str = "then_steps";
const ELSE_STEPS: &str = "else_steps";

#[derive(Deserialize)]
struct RawStep {
    step_id: String,
    #[serde(rename = "type")]
    kind: StepKind,
    #[serde(default)]
    plugin: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    condition: Option<Value>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    scatter: Option<ScatterGather>,
    #[serde(rename = "loopSteps", default)]
    loop_steps: Vec<WorkflowStep>,
    #[serde(rename = "itemVariable", default)]
    item_variable: Option<String>,
    #[serde(default)]
    then_steps: Vec<WorkflowStep>,
    #[serde(default)]
    else_steps: Vec<WorkflowStep>,
    #[serde(default)]
    dependencies: Option<Vec<String>>,
    #[serde(default)]
    output_variable: Option<String>,
    #[serde(default)]
    description: String,
}

fn take_steps(
    config: &mut Map<String, Value>,
    key: &str,
) -> Result<Vec<WorkflowStep>, serde_json::Error> {
    match config.remove(key) {
        Some(value) => serde_json::from_value(value),
        None => Ok(Vec::new()),
    }
}

fn take_scatter(
    config: &mut Map<String, Value>,
) -> Result<Option<ScatterGather>, serde_json::Error> {
    let keys = [SCATTER_INPUT, SCATTER_ITEM, SCATTER_CONCURRENCY, SCATTER_ACTIONS];
    if !keys.iter().any(|key| config.contains_key(*key)) {
        return Ok(None);
    }
    let input = match config.remove(SCATTER_INPUT) {
        Some(value) => serde_json::from_value(value)?,
        None => String::new(),
    };
    let item_variable = match config.remove(SCATTER_ITEM) {
        Some(value) => serde_json::from_value(value)?,
        None => None,
    };
    let max_concurrency = match config.remove(SCATTER_CONCURRENCY) {
        Some(value) => serde_json::from_value(value)?,
        None => None,
    };
    let actions = take_steps(config, SCATTER_ACTIONS)?;
    Ok(Some(ScatterGather {
        input,
        item_variable,
        max_concurrency,
        actions,
    }))
}

impl TryFrom<RawStep> for WorkflowStep {
    type Error = serde_json::Error;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let mut config = raw.config;
        let mut scatter = raw.scatter;
        let mut then_steps = raw.then_steps;
        let mut else_steps = raw.else_steps;
        match raw.kind {
            StepKind::ScatterGather => {
                if let Some(nested) = take_scatter(&mut config)? {
                    scatter = Some(match scatter {
                        Some(mut legacy) => {
                            if legacy.input.is_empty() {
                                legacy.input = nested.input;
                            }
                            legacy.item_variable = legacy.item_variable.or(nested.item_variable);
                            legacy.max_concurrency =
                                legacy.max_concurrency.or(nested.max_concurrency);
                            legacy.actions.extend(nested.actions);
                            legacy
                        }
                        None => nested,
                    });
                }
            }
            StepKind::Conditional => {
                then_steps.extend(take_steps(&mut config, THEN_STEPS)?);
                else_steps.extend(take_steps(&mut config, ELSE_STEPS)?);
            }
            _ => {}
        }
        Ok(WorkflowStep {
            step_id: raw.step_id,
            kind: raw.kind,
            plugin: raw.plugin,
            action: raw.action,
            operation: raw.operation,
            input: raw.input,
            condition: raw.condition,
            params: raw.params,
            config,
            scatter,
            loop_steps: raw.loop_steps,
            item_variable: raw.item_variable,
            then_steps,
            else_steps,
            dependencies: raw.dependencies,
            output_variable: raw.output_variable,
            description: raw.description,
        })
    }
}

/// `config` as written: operation keys followed by the nested-step keys.
struct ConfigView<'a> {
    step: &'a WorkflowStep,
}

impl ConfigView<'_> {
    fn is_empty(&self) -> bool {
        let step = self.step;
        step.config.is_empty()
            && step.scatter.is_none()
            && step.then_steps.is_empty()
            && step.else_steps.is_empty()
    }

    fn reserved(&self, key: &str) -> bool {
        let step = self.step;
        let scatter_key = step.scatter.is_some()
            && matches!(
                key,
                SCATTER_INPUT | SCATTER_ITEM | SCATTER_CONCURRENCY | SCATTER_ACTIONS
            );
        let branch_key = (key == THEN_STEPS && !step.then_steps.is_empty())
            || (key == ELSE_STEPS && !step.else_steps.is_empty());
        scatter_key || branch_key
    }
}

impl Serialize for ConfigView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let step = self.step;
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &step.config {
            if !self.reserved(key) {
                map.serialize_entry(key, value)?;
            }
        }
        if let Some(scatter) = &step.scatter {
            map.serialize_entry(SCATTER_INPUT, &scatter.input)?;
            if let Some(item) = &scatter.item_variable {
                map.serialize_entry(SCATTER_ITEM, item)?;
            }
            if let Some(limit) = scatter.max_concurrency {
                map.serialize_entry(SCATTER_CONCURRENCY, &limit)?;
            }
            map.serialize_entry(SCATTER_ACTIONS, &scatter.actions)?;
        }
        if !step.then_steps.is_empty() {
            map.serialize_entry(THEN_STEPS, &step.then_steps)?;
        }
        if !step.else_steps.is_empty() {
            map.serialize_entry(ELSE_STEPS, &step.else_steps)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct StepWire<'a> {
    step_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    plugin: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<&'a Value>,
    #[serde(skip_serializing_if = "empty_map")]
    params: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "ConfigView::is_empty")]
    config: ConfigView<'a>,
    #[serde(rename = "loopSteps", skip_serializing_if = "empty_steps")]
    loop_steps: &'a [WorkflowStep],
    #[serde(rename = "itemVariable", skip_serializing_if = "Option::is_none")]
    item_variable: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_variable: Option<&'a str>,
    description: &'a str,
}

fn empty_map(map: &&Map<String, Value>) -> bool {
    map.is_empty()
}

fn empty_steps(steps: &&[WorkflowStep]) -> bool {
    steps.is_empty()
}

impl Serialize for WorkflowStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StepWire {
            step_id: &self.step_id,
            kind: self.kind.as_str(),
            plugin: self.plugin.as_deref(),
            action: self.action.as_deref(),
            operation: self.operation.as_deref(),
            input: self.input.as_deref(),
            condition: self.condition.as_ref(),
            params: &self.params,
            config: ConfigView { step: self },
            loop_steps: &self.loop_steps,
            item_variable: self.item_variable.as_deref(),
            dependencies: self.dependencies.as_deref(),
            output_variable: self.output_variable.as_deref(),
            description: &self.description,
        }
        .serialize(serializer)
    }
}

impl WorkflowStep {
    pub fn new(step_id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            step_id: step_id.into(),
            kind,
            plugin: None,
            action: None,
            operation: None,
            input: None,
            condition: None,
            params: Map::new(),
            config: Map::new(),
            scatter: None,
            loop_steps: Vec::new(),
            item_variable: None,
            then_steps: Vec::new(),
            else_steps: Vec::new(),
            dependencies: Some(Vec::new()),
            output_variable: None,
            description: String::new(),
        }
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>, action: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self.action = Some(action.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_output(mut self, output_variable: impl Into<String>) -> Self {
        self.output_variable = Some(output_variable.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace dependencies. `None` entries are dropped.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.dependencies = Some(ids.into_iter().flatten().map(Into::into).collect());
        self
    }

    /// True for steps that open a nested lexical scope with an iterator binding.
    pub fn is_iterating(&self) -> bool {
        matches!(self.kind, StepKind::Loop | StepKind::ScatterGather)
    }

    /// Nested step lists in declaration order.
    pub fn nested_scopes(&self) -> Vec<&Vec<WorkflowStep>> {
        let mut scopes = Vec::new();
        if let Some(scatter) = &self.scatter {
            scopes.push(&scatter.actions);
        }
        if !self.loop_steps.is_empty() {
            scopes.push(&self.loop_steps);
        }
        if !self.then_steps.is_empty() {
            scopes.push(&self.then_steps);
        }
        if !self.else_steps.is_empty() {
            scopes.push(&self.else_steps);
        }
        scopes
    }

    pub fn nested_scopes_mut(&mut self) -> Vec<&mut Vec<WorkflowStep>> {
        let mut scopes = Vec::new();
        if let Some(scatter) = self.scatter.as_mut() {
            scopes.push(&mut scatter.actions);
        }
        if !self.loop_steps.is_empty() {
            scopes.push(&mut self.loop_steps);
        }
        if !self.then_steps.is_empty() {
            scopes.push(&mut self.then_steps);
        }
        if !self.else_steps.is_empty() {
            scopes.push(&mut self.else_steps);
        }
        scopes
    }

    /// Explicit iterator binding of a loop or scatter-gather step.
    pub fn declared_item_variable(&self) -> Option<&str> {
        self.scatter
            .as_ref()
            .and_then(|scatter| scatter.item_variable.as_deref())
            .or(self.item_variable.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    /// Copy of this step with every nested step list emptied.
    pub fn shallow(&self) -> WorkflowStep {
        let mut copy = self.clone();
        if let Some(scatter) = copy.scatter.as_mut() {
            scatter.actions.clear();
        }
        copy.loop_steps.clear();
        copy.then_steps.clear();
        copy.else_steps.clear();
        copy
    }
}
