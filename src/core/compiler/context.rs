#![allow(clippy::result_large_err)] // Capability failures surface as AppError.

use crate::core::capability::{CapabilityRequest, CapabilityResolver, ResolvedCapability};
use crate::core::config::CompilerSettings;
use crate::core::error::AppError;
use crate::core::registry::PluginRegistry;
use crate::core::template;
use intentflow_types::{IntentIr, WorkflowStep};
use std::collections::{HashMap, HashSet};

/// Per-compile state handed to rules and resolvers.
///
/// Holds the IR, an immutable registry handle, and the step-id allocator. A
/// fresh context is built for every compile call.
pub struct CompileContext<'a> {
    pub ir: &'a IntentIr,
    capabilities: CapabilityResolver<'a>,
    settings: &'a CompilerSettings,
    ids: StepIds,
}

impl<'a> CompileContext<'a> {
    pub fn new(ir: &'a IntentIr, registry: &'a PluginRegistry, settings: &'a CompilerSettings) -> Self {
        Self {
            ir,
            capabilities: CapabilityResolver::new(registry),
            settings,
            ids: StepIds::default(),
        }
    }

    pub fn registry(&self) -> &'a PluginRegistry {
        self.capabilities.registry()
    }

    pub fn settings(&self) -> &'a CompilerSettings {
        self.settings
    }

    pub fn resolve(&self, request: &CapabilityRequest) -> Result<ResolvedCapability, AppError> {
        self.capabilities.resolve(request).map_err(AppError::from)
    }

    /// `{prefix}_{n}`, counting from 1 per prefix.
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.ids.next(prefix)
    }

    /// `name` the first time, then `{name}_{n}` from 2.
    pub fn base_id(&mut self, name: &str) -> String {
        self.ids.base(name)
    }
}

#[derive(Debug, Default)]
struct StepIds {
    counters: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl StepIds {
    fn next(&mut self, prefix: &str) -> String {
        loop {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            *counter += 1;
            let id = format!("{}_{}", prefix, counter);
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }

    fn base(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }
        let counter = self.counters.entry(name.to_string()).or_insert(1);
        loop {
            *counter += 1;
            let id = format!("{}_{}", name, counter);
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// Output variable naming shared by every resolver.
pub fn output_of(step_id: &str) -> String {
    format!("{}_output", step_id)
}

/// The "current variable" threaded through a rule's resolver calls, plus the
/// step that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    variable: Option<String>,
    step_id: Option<String>,
}

impl Pipeline {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn at(variable: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            variable: Some(variable.into()),
            step_id: Some(step_id.into()),
        }
    }

    /// Start of a nested scope: data is available but no sibling step precedes it.
    pub fn nested(variable: impl Into<String>) -> Self {
        Self {
            variable: Some(variable.into()),
            step_id: None,
        }
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    pub fn step_id(&self) -> Option<&str> {
        self.step_id.as_deref()
    }

    /// `{{variable}}`, or the workflow input before anything has been read.
    pub fn reference(&self) -> String {
        template::wrap(self.variable.as_deref().unwrap_or("input"))
    }

    pub fn dependencies(&self) -> impl Iterator<Item = Option<String>> {
        std::iter::once(self.step_id.clone())
    }

    pub fn advance(&mut self, step: &WorkflowStep) {
        if let Some(output) = &step.output_variable {
            self.variable = Some(output.clone());
        }
        self.step_id = Some(step.step_id.clone());
    }

    /// Append `steps` to `out`, moving the pipeline past each one.
    pub fn extend(&mut self, out: &mut Vec<WorkflowStep>, steps: Vec<WorkflowStep>) {
        for step in steps {
            self.advance(&step);
            out.push(step);
        }
    }
}
