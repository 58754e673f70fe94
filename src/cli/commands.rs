#![allow(clippy::result_large_err)]

use crate::cli::args::{CompileArgs, ExplainArgs, OutputFormat, ValidateArgs};
use crate::core::config::{ConfigLoader, IntentflowConfig};
use crate::core::error::AppError;
use crate::core::registry::PluginRegistry;
use crate::core::types::ErrorCategory;
use crate::core::{Compiler, WorkflowValidator};
use crate::logging;
use crate::Result;
use anyhow::{anyhow, Context};
use intentflow_types::{IntentIr, WorkflowStep};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Step lists accepted by `validate`: a bare array, a compile result, or a validation report.
#[derive(Deserialize)]
#[serde(untagged)]
enum WorkflowDocument {
    Steps(Vec<WorkflowStep>),
    Compiled { steps: Vec<WorkflowStep> },
    Report { workflow: Vec<WorkflowStep> },
}

impl WorkflowDocument {
    fn into_steps(self) -> Vec<WorkflowStep> {
        match self {
            WorkflowDocument::Steps(steps)
            | WorkflowDocument::Compiled { steps }
            | WorkflowDocument::Report { workflow: steps } => steps,
        }
    }
}

/// Explicit `--config` paths must exist; otherwise `./intentflow.toml` is optional.
pub fn load_config(path: Option<&Path>) -> Result<IntentflowConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            ConfigLoader::load(Some(path))?
        }
        None => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            ConfigLoader::load_from_dir(&cwd)?
        }
    };
    Ok(config)
}

pub fn compile(args: CompileArgs, mut config: IntentflowConfig) -> Result<()> {
    let _guard = logging::init(&config.logging)?;
    if args.no_validate {
        config.compiler.validate_output = false;
    }
    if args.no_fix {
        config.validator.auto_fix = false;
    }

    let registry = PluginRegistry::load_from_file(&args.registry)?;
    let ir: IntentIr = read_document(&args.ir)?;
    tracing::info!(
        ir = %args.ir.display(),
        plugins = registry.len(),
        "compiling intent IR"
    );

    let output = Compiler::new(&registry, &config).compile(&ir)?;
    let rendered = if args.steps_only {
        render(&output.steps, args.format)?
    } else {
        render(&output, args.format)?
    };
    emit(&rendered, args.output.as_deref())?;

    if !output.is_valid() {
        let errors = output
            .validation
            .as_ref()
            .map_or(0, |report| report.errors().count());
        return Err(anyhow!("compiled workflow has {} validation error(s)", errors));
    }
    Ok(())
}

pub fn validate(args: ValidateArgs, mut config: IntentflowConfig) -> Result<()> {
    let _guard = logging::init(&config.logging)?;
    config.validator.auto_fix = args.fix;
    if args.detect_cycles {
        config.validator.detect_cycles = true;
    }

    let registry = match &args.registry {
        Some(path) => Some(PluginRegistry::load_from_file(path)?),
        None => None,
    };
    let document: WorkflowDocument = read_document(&args.workflow)?;
    let steps = document.into_steps();

    let report = WorkflowValidator::new(registry.as_ref(), config.validator.clone()).validate(&steps);
    println!("{}", render(&report, args.format)?);

    if !report.valid {
        return Err(anyhow!(
            "workflow {} is invalid: {} error(s)",
            args.workflow.display(),
            report.errors().count()
        ));
    }
    Ok(())
}

pub fn explain(args: ExplainArgs, config: IntentflowConfig) -> Result<()> {
    let _guard = logging::init(&config.logging)?;
    let ir: IntentIr = read_document(&args.ir)?;
    // Rule selection never consults the registry.
    let registry = PluginRegistry::new();
    let explanation = Compiler::new(&registry, &config).explain(&ir);
    println!("{}", render(&explanation, args.format)?);
    Ok(())
}

/// Parse JSON or YAML by file extension; anything that is not `.yaml`/`.yml` is JSON.
fn read_document<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", path.display(), e),
        )
        .with_code("IFC-IO-001")
    })?;
    let parsed = if crate::core::registry::is_yaml(path) {
        serde_yaml::from_str(&text).map_err(AppError::from)
    } else {
        serde_json::from_str(&text).map_err(AppError::from)
    };
    parsed.map_err(|error| error.with_context("path", path.display().to_string()))
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(text)
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote compilation result");
        }
        None => println!("{}", text),
    }
    Ok(())
}
