//! Fragment resolvers. Each turns IR fragments into ordered workflow steps,
//! reading the pipeline's current variable and producing `{step_id}_output`.

pub mod ai;
pub mod conditional;
pub mod data_source;
pub mod delivery;
pub mod filter;
pub mod grouping;
pub mod loops;
pub mod transform;

pub use ai::{ai_step, resolve_ai_operations};
pub use conditional::{condition_to_dsl, resolve_actions, resolve_conditionals};
pub use data_source::{primary_source_index, resolve_data_source, resolve_data_sources};
pub use delivery::{delivery_step, RecipientRewrite, RUNTIME_METADATA};
pub use filter::{filter_step, resolve_filters};
pub use grouping::{group_field, resolve_grouping};
pub use loops::{extract_source, flatten_step, loop_step, match_ai_operations, scatter_step};
pub use transform::{resolve_transforms, transform_step};
