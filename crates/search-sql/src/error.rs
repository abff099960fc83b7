//! Error types for the search-query compiler.
//!
//! Errors are organised by category: search errors raised while compiling a
//! request, configuration errors raised when the schema catalog or settings
//! do not describe the request, and backend errors raised by the external
//! store or executor.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all compilation and execution operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Search compilation errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while compiling a search request into SQL.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The semantic type has no value table or aggregate mapping for sorting.
    #[error("sort parameter '{parameter}' has unsupported type '{param_type}'")]
    UnsupportedSortType {
        parameter: String,
        param_type: String,
    },

    /// The semantic type has no value table mapping.
    #[error("unsupported search parameter type: {param_type}")]
    UnsupportedParameterType { param_type: String },

    /// The request is malformed and no SQL can be produced for it.
    #[error("invalid search query: {message}")]
    InvalidQuery { message: String },

    /// A fragment's placeholder count does not match its bind values.
    #[error("{context}: {placeholders} placeholders but {binds} bind values")]
    BindMismatch {
        context: String,
        placeholders: usize,
        binds: usize,
    },
}

/// Errors caused by configuration that does not cover a request.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The resource type has no registered table mapping.
    #[error("resource type '{resource_type}' has no registered table mapping")]
    UnregisteredResourceType { resource_type: String },

    /// The resource type name cannot be used as a table prefix.
    #[error("invalid resource type name '{name}'")]
    InvalidResourceTypeName { name: String },

    /// A configuration value is out of range.
    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// No pooled connection became free before the checkout timeout.
    #[error("no free connection in the {backend_name} pool")]
    PoolExhausted { backend_name: String },

    /// Creating tables or indexes failed.
    #[error("schema setup failed: {message}")]
    Schema { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A compiled statement failed to prepare or run.
    #[error("query execution failed: {message}")]
    QueryFailed { message: String },

    /// Resource content could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for search compilation.
pub type SearchResult<T> = Result<T, SearchError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::Serialization {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
