//! Data model for the intent IR (compiler input) and the workflow DSL (compiler output).

pub mod dsl;
pub mod ir;

pub use dsl::{ScatterGather, StepKind, WorkflowStep};
pub use ir::{
    AiOperation, Condition, Conditional, DataSource, DataSourceType, Delivery, DeliveryMethod,
    Filter, Grouping, IntentAction, IntentIr, Loop, Partition, Transform, TransformOperation,
};
