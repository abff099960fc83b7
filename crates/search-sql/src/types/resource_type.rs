//! Resource types and their physical table mapping.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

use super::search_params::ValueTable;

static RESOURCE_TYPE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]{0,63}$").expect("valid regex"));

/// The physical tables owned by one registered resource type.
///
/// Only obtainable from a [`ResourceTypeCatalog`], so holding one proves the
/// type is registered and its name is safe to splice into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTables<'a> {
    name: &'a str,
}

impl<'a> ResourceTables<'a> {
    /// The resource type's simple name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// `{Type}_RESOURCES`
    pub fn resources(&self) -> String {
        format!("{}_RESOURCES", self.name)
    }

    /// `{Type}_LOGICAL_RESOURCES`
    pub fn logical_resources(&self) -> String {
        format!("{}_LOGICAL_RESOURCES", self.name)
    }

    /// `{Type}_{KIND}_VALUES`
    pub fn values(&self, table: ValueTable) -> String {
        table.table_name(self.name)
    }
}

/// The set of resource types that have tables in the store.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeCatalog {
    types: BTreeSet<String>,
}

impl ResourceTypeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from resource type names.
    pub fn from_names<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::new();
        for name in names {
            catalog.register(name)?;
        }
        Ok(catalog)
    }

    /// Registers a resource type.
    pub fn register(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        let name = name.into();
        if !RESOURCE_TYPE_NAME.is_match(&name) {
            return Err(ConfigError::InvalidResourceTypeName { name });
        }
        self.types.insert(name);
        Ok(())
    }

    /// Returns the table mapping of a registered type.
    pub fn tables(&self, name: &str) -> Result<ResourceTables<'_>, ConfigError> {
        self.types
            .get(name)
            .map(|name| ResourceTables { name })
            .ok_or_else(|| ConfigError::UnregisteredResourceType {
                resource_type: name.to_string(),
            })
    }

    /// Returns true if the type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    /// Iterates registered type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
