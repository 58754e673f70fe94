//! Logical intent IR produced by the upstream generation stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Root IR document handed to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IntentIr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub transforms: Vec<Transform>,
    #[serde(default)]
    pub ai_operations: Vec<AiOperation>,
    #[serde(default)]
    pub conditionals: Vec<Conditional>,
    #[serde(default)]
    pub loops: Vec<Loop>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<Grouping>,
    #[serde(default, alias = "deliveries")]
    pub delivery: Vec<Delivery>,
}

/// Kind of data source. Unknown kinds survive parsing so the compiler can reject them
/// with a precise diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum DataSourceType {
    Tabular,
    Api,
    Webhook,
    Database,
    File,
    Stream,
    Other(String),
}

impl DataSourceType {
    pub fn as_str(&self) -> &str {
        match self {
            DataSourceType::Tabular => "tabular",
            DataSourceType::Api => "api",
            DataSourceType::Webhook => "webhook",
            DataSourceType::Database => "database",
            DataSourceType::File => "file",
            DataSourceType::Stream => "stream",
            DataSourceType::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for DataSourceType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "tabular" => DataSourceType::Tabular,
            "api" => DataSourceType::Api,
            "webhook" => DataSourceType::Webhook,
            "database" => DataSourceType::Database,
            "file" => DataSourceType::File,
            "stream" => DataSourceType::Stream,
            _ => DataSourceType::Other(value),
        }
    }
}

impl From<DataSourceType> for String {
    fn from(value: DataSourceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place the workflow reads from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataSource {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: DataSourceType,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Row-level predicate applied to the pipeline data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Filter {
    pub id: String,
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOperation {
    Sort,
    Group,
    Aggregate,
    Map,
    Reduce,
    Join,
    Deduplicate,
    Flatten,
    Filter,
}

impl TransformOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformOperation::Sort => "sort",
            TransformOperation::Group => "group",
            TransformOperation::Aggregate => "aggregate",
            TransformOperation::Map => "map",
            TransformOperation::Reduce => "reduce",
            TransformOperation::Join => "join",
            TransformOperation::Deduplicate => "deduplicate",
            TransformOperation::Flatten => "flatten",
            TransformOperation::Filter => "filter",
        }
    }
}

impl fmt::Display for TransformOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection-level reshaping of the pipeline data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operation: TransformOperation,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Boolean condition tree used by conditionals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Simple {
        field: String,
        operator: String,
        #[serde(default)]
        value: Value,
    },
    ComplexAnd {
        conditions: Vec<Condition>,
    },
    ComplexOr {
        conditions: Vec<Condition>,
    },
    ComplexNot {
        conditions: Vec<Condition>,
    },
}

impl Condition {
    pub fn is_simple(&self) -> bool {
        matches!(self, Condition::Simple { .. })
    }
}

/// Action nested inside a conditional branch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentAction {
    Delivery {
        method: DeliveryMethod,
        #[serde(default)]
        config: Map<String, Value>,
    },
    AiOperation {
        #[serde(default)]
        id: Option<String>,
        #[serde(default = "default_ai_operation_type")]
        operation: String,
        #[serde(default)]
        instruction: String,
        #[serde(default)]
        output_schema: Option<Value>,
    },
    Transform {
        operation: TransformOperation,
        #[serde(default)]
        config: Map<String, Value>,
    },
    Filter {
        field: String,
        operator: String,
        #[serde(default)]
        value: Value,
    },
}

fn default_ai_operation_type() -> String {
    "process".to_string()
}

/// If/else branch over the pipeline data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Conditional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub when: Condition,
    #[serde(default)]
    pub then: Vec<IntentAction>,
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<IntentAction>>,
}

impl Conditional {
    /// A conditional is "simple" when each branch holds at most one action.
    pub fn is_simple(&self) -> bool {
        self.then.len() <= 1 && self.otherwise.as_ref().map_or(true, |items| items.len() <= 1)
    }
}

/// Per-item iteration over a collection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Loop {
    pub id: String,
    pub for_each: String,
    pub item_variable: String,
    #[serde(default, rename = "do")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Partition {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Grouping {
    pub group_by: String,
    #[serde(default)]
    pub emit_per_group: bool,
}

/// Delivery channel. Unknown methods survive parsing, see [`DataSourceType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryMethod {
    Email,
    Slack,
    Webhook,
    Database,
    ApiCall,
    File,
    Sms,
    Other(String),
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryMethod::Email => "email",
            DeliveryMethod::Slack => "slack",
            DeliveryMethod::Webhook => "webhook",
            DeliveryMethod::Database => "database",
            DeliveryMethod::ApiCall => "api_call",
            DeliveryMethod::File => "file",
            DeliveryMethod::Sms => "sms",
            DeliveryMethod::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for DeliveryMethod {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => DeliveryMethod::Email,
            "slack" => DeliveryMethod::Slack,
            "webhook" => DeliveryMethod::Webhook,
            "database" => DeliveryMethod::Database,
            "api_call" => DeliveryMethod::ApiCall,
            "file" => DeliveryMethod::File,
            "sms" => DeliveryMethod::Sms,
            _ => DeliveryMethod::Other(value),
        }
    }
}

impl From<DeliveryMethod> for String {
    fn from(value: DeliveryMethod) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the workflow results end up.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Delivery {
    pub id: String,
    pub method: DeliveryMethod,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// LLM-backed processing step.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AiOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub operation_type: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}
