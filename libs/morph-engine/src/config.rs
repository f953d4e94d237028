use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which source wins when a destination member could be filled both by a
/// direct field match and by a key of the source's overflow slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Overflow only fills members that direct matching left unset.
    #[default]
    PreferFields,
    /// Overflow keys overwrite members already set by direct matching.
    PreferAdditionalData,
}

/// Adapter options, fixed at construction, parsed from TOML.
///
/// ```toml
/// include_zero_values = true
/// case_insensitive = true
/// overwrite_policy = "prefer_additional_data"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Marshal zero-valued leftovers into the destination overflow too.
    pub include_zero_values: bool,
    /// Fall back to case-insensitive name matching for fields and overflow keys.
    pub case_insensitive: bool,
    pub overwrite_policy: OverwritePolicy,
    pub disable_unmarshal_additional_data: bool,
    pub disable_marshal_additional_data: bool,
}

impl AdapterOptions {
    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse options from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn with_include_zero_values(mut self, on: bool) -> Self {
        self.include_zero_values = on;
        self
    }

    pub fn with_case_insensitive(mut self, on: bool) -> Self {
        self.case_insensitive = on;
        self
    }

    pub fn with_overwrite_policy(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite_policy = policy;
        self
    }

    pub fn with_unmarshal_disabled(mut self, off: bool) -> Self {
        self.disable_unmarshal_additional_data = off;
        self
    }

    pub fn with_marshal_disabled(mut self, off: bool) -> Self {
        self.disable_marshal_additional_data = off;
        self
    }
}
