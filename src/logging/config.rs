use crate::logging::layers::console::ConsoleOutput;
use serde::{Deserialize, Serialize};

const DEFAULT_LEVEL: &str = "info";

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

/// `[logging]` section of intentflow.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub default_level: String,
    /// Console sink for log events.
    #[serde(default)]
    pub console_output: ConsoleOutput,
    /// Emit console events as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            console_output: ConsoleOutput::default(),
            json: false,
        }
    }
}
