//! Configuration for search compilation.
//!
//! # Example
//!
//! ```
//! use helios_search_sql::config::{SearchSqlConfig, SqlDialect};
//!
//! let config = SearchSqlConfig::from_json_str(
//!     r#"{ "dialect": "sqlite", "resource_types": ["Patient", "Organization"] }"#,
//! ).unwrap();
//!
//! assert_eq!(config.dialect, SqlDialect::Sqlite);
//! assert_eq!(config.max_page_size, 1000);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DEFAULT_PAGE_SIZE, ResourceTypeCatalog};

/// Pagination syntax emitted at the outermost query level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    #[default]
    Standard,
    /// `LIMIT m OFFSET n`
    Sqlite,
}

/// When staged parameter-name candidates are merged into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Merge right after a store lookup staged a candidate.
    #[default]
    Eager,
    /// Merge only when `reconcile()` is called, e.g. by the background reconciler.
    Deferred,
}

/// Settings shared by every compiled query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSqlConfig {
    /// Pagination syntax.
    #[serde(default)]
    pub dialect: SqlDialect,

    /// Page size used when a request does not set one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest page size a request may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Id substituted for parameter names unknown to the store.
    ///
    /// Must never match a stored PARAMETER_NAME_ID.
    #[serde(default = "default_unknown_parameter_name_id")]
    pub unknown_parameter_name_id: i64,

    /// Id substituted for code systems unknown to the store.
    #[serde(default = "default_unknown_code_system_id")]
    pub unknown_code_system_id: i64,

    /// When staged name candidates are merged into the cache.
    #[serde(default)]
    pub reconcile_mode: ReconcileMode,

    /// Interval of the background reconciler in milliseconds.
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,

    /// Resource types that have tables in the store.
    #[serde(default)]
    pub resource_types: Vec<String>,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_unknown_parameter_name_id() -> i64 {
    -1
}

fn default_unknown_code_system_id() -> i64 {
    -1
}

fn default_reconcile_interval_ms() -> u64 {
    1000
}

impl Default for SearchSqlConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            unknown_parameter_name_id: default_unknown_parameter_name_id(),
            unknown_code_system_id: default_unknown_code_system_id(),
            reconcile_mode: ReconcileMode::default(),
            reconcile_interval_ms: default_reconcile_interval_ms(),
            resource_types: Vec::new(),
        }
    }
}

impl SearchSqlConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the dialect.
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the reconcile mode.
    pub fn with_reconcile_mode(mut self, mode: ReconcileMode) -> Self {
        self.reconcile_mode = mode;
        self
    }

    /// Sets the registered resource types.
    pub fn with_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_page_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size".to_string(),
                message: format!("must be between 1 and {}", self.max_page_size),
            });
        }
        if self.unknown_parameter_name_id >= 0 {
            return Err(ConfigError::InvalidValue {
                field: "unknown_parameter_name_id".to_string(),
                message: "must be negative so it never matches a stored id".to_string(),
            });
        }
        if self.unknown_code_system_id >= 0 {
            return Err(ConfigError::InvalidValue {
                field: "unknown_code_system_id".to_string(),
                message: "must be negative so it never matches a stored id".to_string(),
            });
        }
        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconcile_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the reconcile interval.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    /// Builds the catalog of configured resource types.
    pub fn catalog(&self) -> Result<ResourceTypeCatalog, ConfigError> {
        ResourceTypeCatalog::from_names(self.resource_types.iter().cloned())
    }
}
