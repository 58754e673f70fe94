pub mod args;
pub mod commands;

pub use args::{CompileArgs, ExplainArgs, OutputFormat, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMPILER COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "intentflow")]
#[command(version = crate::VERSION)]
#[command(about = "Compile logical intent IR into executable workflow steps")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: explain an IR to see which rule applies, compile it against a registry snapshot, then re-validate hand-edited workflows."
)]
pub struct Args {
    /// Configuration file (default: ./intentflow.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Compile an IR document into workflow steps",
        long_about = "Compile selects the highest-priority rule that supports the IR, resolves every fragment against the plugin registry, and validates the result (auto-fixing what it can unless --no-fix is given).",
        after_help = "Example:\n    intentflow compile ./ir.json --registry ./registry.json --format yaml"
    )]
    Compile(CompileArgs),
    #[command(
        about = "Validate an existing workflow",
        long_about = "Validate runs the post-compilation checks over a step list and exits non-zero when error-severity issues remain.",
        after_help = "Example:\n    intentflow validate ./workflow.json --registry ./registry.json --fix"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Show how each compiler rule judges an IR",
        long_about = "Explain lists every registered rule with its priority and whether it supports the IR, then reports the selected rule's pre-check issues and step estimate.",
        after_help = "Example:\n    intentflow explain ./ir.yaml"
    )]
    Explain(ExplainArgs),
}

pub fn run(args: Args) -> crate::Result<()> {
    let config = commands::load_config(args.config.as_deref())?;
    match args.command {
        Command::Compile(compile_args) => commands::compile(compile_args, config),
        Command::Validate(validate_args) => commands::validate(validate_args, config),
        Command::Explain(explain_args) => commands::explain(explain_args, config),
    }
}
