//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::collation::Locale;
use crate::error::ConfigError;
use crate::selection::PredicateCompiler;

/// Settings shared by every view of an application. Missing JSON keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Case folding for search and collation for text sorting
    pub locale: Locale,
    /// Rows shown by a lazy window before the first "load more", and the page size of paged windows
    pub initial_page_size: usize,
    /// Rows added by each "load more"
    pub page_increment: usize,
    /// Numeric field that blocks deletion while greater than zero. `None` disables the guard.
    pub dependent_count_field: Option<String>,
    /// Criterion values meaning "no filter"
    pub inactive_values: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: Locale::Turkish,
            initial_page_size: 12,
            page_increment: 12,
            dependent_count_field: Some("employeeCount".to_string()),
            inactive_values: vec![String::new(), "all".to_string()],
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_page_size == 0 {
            return Err(ConfigError::Invalid("initial_page_size must be greater than zero".to_string()));
        }
        if self.page_increment == 0 {
            return Err(ConfigError::Invalid("page_increment must be greater than zero".to_string()));
        }
        if matches!(&self.dependent_count_field, Some(field) if field.trim().is_empty()) {
            return Err(ConfigError::Invalid("dependent_count_field must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn predicate_compiler(&self) -> PredicateCompiler { PredicateCompiler::new(self.locale).with_inactive_values(self.inactive_values.iter().cloned()) }
}
