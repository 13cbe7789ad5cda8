//! # Engine Configuration
//!
//! Tunables of the rule engine. The core only defines the shape and its
//! defaults; reading a configuration file is the app layer's job.

use crate::OpptakError;
use crate::primitives::{DEFAULT_DIPLOMA_DOCUMENT_TYPE, DEFAULT_MAX_RULE_DEPTH};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Connective words used when rendering a rule tree as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLabels {
    pub and: String,
    pub or: String,
    pub not: String,
}

impl Default for RenderLabels {
    fn default() -> Self {
        Self {
            and: "OG".to_string(),
            or: "ELLER".to_string(),
            not: "IKKE".to_string(),
        }
    }
}

/// Configuration shared by every engine component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Document type tag that proves general study eligibility.
    pub diploma_document_type: String,
    pub labels: RenderLabels,
    /// Bound on recursion through child links.
    pub max_rule_depth: usize,
    /// Fixed date used to derive applicant ages. `None` means today (UTC).
    pub reference_date: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            diploma_document_type: DEFAULT_DIPLOMA_DOCUMENT_TYPE.to_string(),
            labels: RenderLabels::default(),
            max_rule_depth: DEFAULT_MAX_RULE_DEPTH,
            reference_date: None,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), OpptakError> {
        if self.diploma_document_type.trim().is_empty() {
            return Err(OpptakError::ConfigError(
                "diploma_document_type must not be empty".to_string(),
            ));
        }
        if self.max_rule_depth == 0 {
            return Err(OpptakError::ConfigError(
                "max_rule_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The date ages are derived against.
    #[must_use]
    pub fn as_of(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.labels.and, "OG");
        assert_eq!(config.diploma_document_type, "vitnemal");
    }

    #[test]
    fn zero_depth_rejected() {
        let config = EngineConfig {
            max_rule_depth: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OpptakError::ConfigError(_))
        ));
    }

    #[test]
    fn reference_date_overrides_today() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).expect("date");
        let config = EngineConfig {
            reference_date: Some(date),
            ..EngineConfig::default()
        };
        assert_eq!(config.as_of(), date);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"labels": {"and": "AND"}}"#).expect("parse");
        assert_eq!(config.labels.and, "AND");
        assert_eq!(config.labels.or, "ELLER");
        assert_eq!(config.max_rule_depth, DEFAULT_MAX_RULE_DEPTH);
    }
}
