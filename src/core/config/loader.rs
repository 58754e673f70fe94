#![allow(clippy::result_large_err)]

use super::IntentflowConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::logging::layers::console::ConsoleOutput;
use std::env;
use std::path::Path;
use std::str::FromStr;
use tracing_subscriber::filter::Directive;

pub const CONFIG_FILE_NAME: &str = "intentflow.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from a directory (dir/intentflow.toml).
    /// Environment variables override config file values; a missing file yields defaults.
    pub fn load_from_dir(dir: &Path) -> Result<IntentflowConfig, AppError> {
        Self::load(Some(&dir.join(CONFIG_FILE_NAME)))
    }

    /// Load config from an explicit path (or defaults when `None` or missing), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<IntentflowConfig, AppError> {
        let from_file = match path {
            Some(path) => Self::load_from_file(path)?,
            None => None,
        };
        let mut config = from_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<IntentflowConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
            .with_code("IFC-IO-001")
        })?;

        let config: IntentflowConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("IFC-CFG-001")
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(config: &mut IntentflowConfig) {
        if let Ok(value) = env::var("INTENTFLOW_MAX_CONCURRENCY") {
            if let Ok(parsed) = value.trim().parse::<u32>() {
                config.compiler.default_max_concurrency = parsed;
            }
        }

        if let Ok(value) = env::var("INTENTFLOW_VALIDATE") {
            if let Ok(parsed) = value.trim().parse::<bool>() {
                config.compiler.validate_output = parsed;
            }
        }

        if let Ok(value) = env::var("INTENTFLOW_AUTO_FIX") {
            if let Ok(parsed) = value.trim().parse::<bool>() {
                config.validator.auto_fix = parsed;
            }
        }

        if let Ok(value) = env::var("INTENTFLOW_DETECT_CYCLES") {
            if let Ok(parsed) = value.trim().parse::<bool>() {
                config.validator.detect_cycles = parsed;
            }
        }

        if let Ok(level) = env::var("INTENTFLOW_LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.logging.default_level = level;
            }
        }

        if let Ok(value) = env::var("INTENTFLOW_CONSOLE_OUTPUT") {
            if let Ok(output) = ConsoleOutput::from_str(&value) {
                config.logging.console_output = output;
            }
        }
    }

    fn validate(config: &IntentflowConfig) -> Result<(), AppError> {
        if config.compiler.default_max_concurrency == 0 {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                "compiler.default_max_concurrency must be >= 1",
            )
            .with_code("IFC-CFG-002"));
        }
        Directive::from_str(&config.logging.default_level).map_err(|_| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "logging.default_level '{}' must be a valid tracing directive",
                    config.logging.default_level
                ),
            )
            .with_code("IFC-CFG-002")
        })?;
        Ok(())
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "INTENTFLOW_MAX_CONCURRENCY - Override compiler.default_max_concurrency (default: 5)",
            "INTENTFLOW_VALIDATE - Override compiler.validate_output (true/false)",
            "INTENTFLOW_AUTO_FIX - Override validator.auto_fix (true/false)",
            "INTENTFLOW_DETECT_CYCLES - Override validator.detect_cycles (true/false)",
            "INTENTFLOW_LOG_LEVEL - Override logging.default_level (RUST_LOG still wins)",
            "INTENTFLOW_CONSOLE_OUTPUT - Override logging.console_output (stdout, stderr, none)",
        ]
    }
}
