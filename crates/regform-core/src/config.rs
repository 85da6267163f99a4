//! Engine configuration
//!
//! Plain serde struct with builder-style setters; loadable from TOML.

use serde::{Deserialize, Serialize};

/// Default number of passes `unserialize` may take before giving up
pub const DEFAULT_MAX_UNSERIALIZE_PASSES: usize = 32;

/// Default instance cap for repeat wrappers that declare no `maxRepeat`
pub const DEFAULT_MAX_INSTANCES: usize = 1000;

/// Embargo window, in days from the submission date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbargoConfig {
    /// End date must be strictly more than this many days away
    pub min_days: i64,
    /// End date may be at most this many days away
    pub max_days: i64,
}

impl Default for EmbargoConfig {
    fn default() -> Self {
        Self {
            min_days: 2,
            max_days: 1460,
        }
    }
}

/// Document engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Freeze every repeat affordance (read-only review mode)
    pub disable_all: bool,
    /// Make failing validation rules mark items invalid
    pub strict_validation: bool,
    /// Upper bound on `unserialize` passes
    pub max_unserialize_passes: usize,
    /// Instance cap for repeat wrappers without a declared maximum
    pub max_instances: usize,
    /// Embargo window
    pub embargo: EmbargoConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disable_all: false,
            strict_validation: false,
            max_unserialize_passes: DEFAULT_MAX_UNSERIALIZE_PASSES,
            max_instances: DEFAULT_MAX_INSTANCES,
            embargo: EmbargoConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With every repeat affordance disabled
    #[inline]
    #[must_use]
    pub fn with_disable_all(mut self, disable_all: bool) -> Self {
        self.disable_all = disable_all;
        self
    }

    /// With strict validation
    #[inline]
    #[must_use]
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// With unserialize pass limit
    #[inline]
    #[must_use]
    pub fn with_max_unserialize_passes(mut self, passes: usize) -> Self {
        self.max_unserialize_passes = passes;
        self
    }

    /// With instance cap for unbounded repeats
    #[inline]
    #[must_use]
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// With embargo window
    #[inline]
    #[must_use]
    pub fn with_embargo(mut self, embargo: EmbargoConfig) -> Self {
        self.embargo = embargo;
        self
    }

    /// Parse from TOML text and validate
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or the values contradict each other
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value consistency
    ///
    /// # Errors
    /// Returns error on a zero pass limit, a zero instance cap or an empty
    /// embargo window
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_unserialize_passes == 0 {
            return Err(ConfigError::Invalid(
                "max_unserialize_passes must be at least 1".to_string(),
            ));
        }
        if self.max_instances == 0 {
            return Err(ConfigError::Invalid(
                "max_instances must be at least 1".to_string(),
            ));
        }
        if self.embargo.min_days >= self.embargo.max_days {
            return Err(ConfigError::Invalid(format!(
                "embargo window is empty: min_days {} >= max_days {}",
                self.embargo.min_days, self.embargo.max_days
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML did not parse
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values contradict each other
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
