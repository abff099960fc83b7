//! Offset-based pagination for compiled search queries.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A page window: zero-based row offset plus a positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of rows to skip.
    pub offset: u64,
    /// Maximum number of rows to return.
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Creates a page window.
    pub fn new(offset: u64, size: u32) -> Self {
        Self { offset, size }
    }

    /// Creates the window for a one-based page number.
    pub fn number(page: u32, size: u32) -> Self {
        Self {
            offset: u64::from(page.saturating_sub(1)) * u64::from(size),
            size,
        }
    }

    /// Checks the window against the configured maximum page size.
    pub fn validate(&self, max_size: u32) -> Result<(), SearchError> {
        if self.size == 0 {
            return Err(SearchError::InvalidQuery {
                message: "page size must be positive".to_string(),
            });
        }
        if self.size > max_size {
            return Err(SearchError::InvalidQuery {
                message: format!("page size {} exceeds maximum {}", self.size, max_size),
            });
        }
        Ok(())
    }
}
