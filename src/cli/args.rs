use clap::Args;
use std::path::PathBuf;

#[derive(Clone, Copy, clap::ValueEnum, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML document
    Yaml,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Logical IR document (.json, .yaml or .yml)
    #[arg(value_name = "IR")]
    pub ir: PathBuf,

    /// Plugin registry snapshot used for capability resolution
    #[arg(long, value_name = "FILE")]
    pub registry: PathBuf,

    /// Write the compilation result here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Serialization of the compilation result
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Skip the post-compilation validator
    #[arg(long, help_heading = "Validation")]
    pub no_validate: bool,

    /// Report fixable issues without repairing them
    #[arg(long, help_heading = "Validation")]
    pub no_fix: bool,

    /// Print only the step list instead of the full compilation report
    #[arg(long)]
    pub steps_only: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Workflow document: a step array or a compile result with a `steps` field
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Plugin registry snapshot; plugin and action checks are skipped without one
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Apply auto-fixes and include the repaired workflow in the report
    #[arg(long)]
    pub fix: bool,

    /// Also report dependency cycles
    #[arg(long)]
    pub detect_cycles: bool,

    /// Serialization of the validation report
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ExplainArgs {
    /// Logical IR document (.json, .yaml or .yml)
    #[arg(value_name = "IR")]
    pub ir: PathBuf,

    /// Serialization of the explanation
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}
