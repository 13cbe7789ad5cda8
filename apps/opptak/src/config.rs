//! # Configuration Loading
//!
//! Reads the engine configuration from a TOML file.
//!
//! Lookup order:
//! 1. `--config <path>` (must exist)
//! 2. `OPPTAK_CONFIG` environment variable (must exist)
//! 3. `opptak.toml` in the working directory, if present
//! 4. Built-in defaults
//!
//! ```toml
//! diploma_document_type = "vitnemal"
//! max_rule_depth = 64
//! reference_date = "2024-08-01"
//!
//! [labels]
//! and = "OG"
//! or = "ELLER"
//! not = "IKKE"
//! ```

use opptak_core::{EngineConfig, OpptakError};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "opptak.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "OPPTAK_CONFIG";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parse and validate an engine configuration from TOML text.
///
/// Missing keys fall back to their defaults.
pub fn parse_engine_config(content: &str) -> Result<EngineConfig, OpptakError> {
    let config: EngineConfig = toml::from_str(content)
        .map_err(|e| OpptakError::ConfigError(format!("Invalid TOML: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Resolve which config file to read, if any.
fn resolve_config_path(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some((PathBuf::from(path), true));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    fallback.is_file().then_some((fallback, false))
}

/// Load the engine configuration.
///
/// An explicitly named file that cannot be read is an error; a missing
/// default file is not.
pub fn load_engine_config(explicit: Option<&Path>) -> Result<EngineConfig, OpptakError> {
    let Some((path, required)) = resolve_config_path(explicit) else {
        tracing::debug!("No config file found, using defaults");
        return Ok(EngineConfig::default());
    };

    if !path.is_file() {
        if required {
            return Err(OpptakError::ConfigError(format!(
                "Config file '{}' not found",
                path.display()
            )));
        }
        return Ok(EngineConfig::default());
    }

    let metadata = std::fs::metadata(&path)
        .map_err(|e| OpptakError::IoError(format!("Cannot read config metadata: {}", e)))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(OpptakError::ConfigError(format!(
            "Config file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CONFIG_FILE_SIZE
        )));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| OpptakError::IoError(format!("Read config: {}", e)))?;
    let config = parse_engine_config(&content)?;
    tracing::info!("Loaded engine configuration from {}", path.display());
    Ok(config)
}

// =============================================================================
// TESTS
// =============================================================================
