pub mod capability;
pub mod compiler;
pub mod config;
pub mod error;
pub mod registry;
pub mod template;
pub mod types;
pub mod validator;

pub use capability::{CapabilityRequest, CapabilityResolver, PluginCategory, ResolvedCapability};
pub use compiler::{CompilationOutput, CompileExplanation, Compiler, CompilerRule, RuleSelector};
pub use config::{ConfigLoader, IntentflowConfig};
pub use error::AppError;
pub use registry::{ActionDefinition, PluginDefinition, PluginRegistry};
pub use types::*;
pub use validator::{Severity, ValidationIssue, ValidationReport, WorkflowValidator};
