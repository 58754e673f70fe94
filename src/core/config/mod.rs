pub mod loader;

pub use loader::ConfigLoader;

use crate::logging::config::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Main configuration loaded from intentflow.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IntentflowConfig {
    /// Compiler configuration
    #[serde(default)]
    pub compiler: CompilerSettings,

    /// Post-compilation validator configuration
    #[serde(default)]
    pub validator: ValidatorSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerSettings {
    /// Concurrency directive placed on scatter-gather steps when the IR omits one
    #[serde(default = "default_max_concurrency")]
    pub default_max_concurrency: u32,

    /// Run the validator over every compiled workflow
    #[serde(default = "default_true")]
    pub validate_output: bool,
}

/// Validator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorSettings {
    /// Apply deterministic fixes for auto-fixable issues
    #[serde(default = "default_true")]
    pub auto_fix: bool,

    /// Report dependency cycles in addition to forward references
    #[serde(default)]
    pub detect_cycles: bool,
}

fn default_max_concurrency() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            default_max_concurrency: default_max_concurrency(),
            validate_output: true,
        }
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        ValidatorSettings {
            auto_fix: true,
            detect_cycles: false,
        }
    }
}
