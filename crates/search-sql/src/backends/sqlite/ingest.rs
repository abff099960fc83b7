//! Write path: stores resource versions with their indexed values.
//!
//! Turning a resource's fields into [`IndexValue`]s is the caller's job;
//! this module only persists what it is given.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::QueryContext;
use crate::error::StorageResult;
use crate::types::{ResourceTables, ValueTable};

use super::SqliteBackend;
use super::backend::internal_error;
use super::executor::format_timestamp;

/// One indexable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexValue {
    /// A string, reference (`Type/id`) or URI.
    String(String),
    /// A coded value.
    Token {
        /// Code system URI.
        system: Option<String>,
        /// The code.
        code: String,
    },
    /// An instant or period.
    Date {
        /// The representative value.
        value: DateTime<Utc>,
        /// Period start.
        start: Option<DateTime<Utc>>,
        /// Period end.
        end: Option<DateTime<Utc>>,
    },
    /// A decimal or integer.
    Number(f64),
    /// A measured amount.
    Quantity {
        /// The amount.
        value: f64,
        /// Unit code.
        code: Option<String>,
        /// Unit system URI.
        system: Option<String>,
    },
}

impl IndexValue {
    /// The table this value is stored in.
    pub fn value_table(&self) -> ValueTable {
        match self {
            IndexValue::String(_) => ValueTable::Str,
            IndexValue::Token { .. } => ValueTable::Token,
            IndexValue::Date { .. } => ValueTable::Date,
            IndexValue::Number(_) => ValueTable::Number,
            IndexValue::Quantity { .. } => ValueTable::Quantity,
        }
    }

    /// The code system URI of a token or quantity, if it has one.
    pub fn code_system(&self) -> Option<&str> {
        match self {
            IndexValue::Token { system, .. } | IndexValue::Quantity { system, .. } => {
                system.as_deref()
            }
            _ => None,
        }
    }
}

/// A value indexed under a search-parameter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedValue {
    /// Search-parameter name.
    pub name: String,
    /// The value.
    pub value: IndexValue,
}

/// A resource version to store, with its indexed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedResource {
    /// Resource type; must be registered.
    pub resource_type: String,
    /// Logical id.
    pub logical_id: String,
    /// Version timestamp.
    pub last_updated: DateTime<Utc>,
    /// Whether this version marks the resource deleted.
    pub deleted: bool,
    /// The resource content.
    pub data: Value,
    /// Indexed values.
    pub values: Vec<IndexedValue>,
}

impl IndexedResource {
    /// Creates a version stamped with the current time.
    pub fn new(resource_type: impl Into<String>, logical_id: impl Into<String>, data: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            logical_id: logical_id.into(),
            last_updated: Utc::now(),
            deleted: false,
            data,
            values: Vec::new(),
        }
    }

    /// Sets the version timestamp.
    pub fn with_last_updated(mut self, ts: DateTime<Utc>) -> Self {
        self.last_updated = ts;
        self
    }

    /// Marks the version as a deletion.
    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Adds a value.
    pub fn with_value(mut self, name: impl Into<String>, value: IndexValue) -> Self {
        self.values.push(IndexedValue {
            name: name.into(),
            value,
        });
        self
    }

    /// Adds a string value.
    pub fn string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(name, IndexValue::String(value.into()))
    }

    /// Adds a reference, e.g. `Organization/o1`.
    pub fn reference(self, name: impl Into<String>, target_type: &str, target_id: &str) -> Self {
        self.with_value(name, IndexValue::String(format!("{}/{}", target_type, target_id)))
    }

    /// Adds a token.
    pub fn token(self, name: impl Into<String>, system: Option<&str>, code: impl Into<String>) -> Self {
        self.with_value(
            name,
            IndexValue::Token {
                system: system.map(String::from),
                code: code.into(),
            },
        )
    }

    /// Adds an instant.
    pub fn date(self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.with_value(
            name,
            IndexValue::Date {
                value,
                start: None,
                end: None,
            },
        )
    }

    /// Adds a number.
    pub fn number(self, name: impl Into<String>, value: f64) -> Self {
        self.with_value(name, IndexValue::Number(value))
    }

    /// Adds a quantity.
    pub fn quantity(self, name: impl Into<String>, value: f64, code: Option<&str>, system: Option<&str>) -> Self {
        self.with_value(
            name,
            IndexValue::Quantity {
                value,
                code: code.map(String::from),
                system: system.map(String::from),
            },
        )
    }
}

/// Ids assigned to a stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestedVersion {
    /// The logical resource row.
    pub logical_resource_id: i64,
    /// The new version row.
    pub resource_id: i64,
    /// The new version number, starting at 1.
    pub version_id: i64,
}

fn next_id(tx: &Transaction<'_>) -> StorageResult<i64> {
    tx.execute("INSERT INTO ID_SEQUENCE DEFAULT VALUES", [])
        .map_err(|e| internal_error(format!("Failed to allocate id: {}", e)))?;
    Ok(tx.last_insert_rowid())
}

/// Ids a value is stored under, resolved before the write transaction.
#[derive(Debug, Clone, Copy)]
struct ValueKeys {
    name_id: i64,
    system_id: Option<i64>,
}

fn insert_value(
    tx: &Transaction<'_>,
    tables: &ResourceTables<'_>,
    keys: ValueKeys,
    resource_id: i64,
    value: &IndexValue,
) -> StorageResult<()> {
    let ValueKeys { name_id, system_id } = keys;
    let table = tables.values(value.value_table());
    let result = match value {
        IndexValue::String(s) => tx.execute(
            &format!(
                "INSERT INTO {} (PARAMETER_NAME_ID, STR_VALUE, STR_VALUE_LCASE, RESOURCE_ID) VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![name_id, s, s.to_lowercase(), resource_id],
        ),
        IndexValue::Token { code, .. } => tx.execute(
            &format!(
                "INSERT INTO {} (PARAMETER_NAME_ID, CODE_SYSTEM_ID, TOKEN_VALUE, RESOURCE_ID) VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![name_id, system_id, code, resource_id],
        ),
        IndexValue::Date { value, start, end } => tx.execute(
            &format!(
                "INSERT INTO {} (PARAMETER_NAME_ID, DATE_VALUE, DATE_START, DATE_END, RESOURCE_ID) VALUES (?1, ?2, ?3, ?4, ?5)",
                table
            ),
            params![
                name_id,
                format_timestamp(value),
                format_timestamp(start.as_ref().unwrap_or(value)),
                format_timestamp(end.as_ref().unwrap_or(value)),
                resource_id
            ],
        ),
        IndexValue::Number(n) => tx.execute(
            &format!(
                "INSERT INTO {} (PARAMETER_NAME_ID, NUMBER_VALUE, RESOURCE_ID) VALUES (?1, ?2, ?3)",
                table
            ),
            params![name_id, n, resource_id],
        ),
        IndexValue::Quantity { value, code, .. } => tx.execute(
            &format!(
                "INSERT INTO {} (PARAMETER_NAME_ID, CODE, QUANTITY_VALUE, QUANTITY_VALUE_LOW, QUANTITY_VALUE_HIGH, CODE_SYSTEM_ID, RESOURCE_ID) \
                 VALUES (?1, ?2, ?3, ?3, ?3, ?4, ?5)",
                table
            ),
            params![name_id, code, value, system_id, resource_id],
        ),
    };
    result
        .map(|_| ())
        .map_err(|e| internal_error(format!("Failed to insert into {}: {}", table, e)))
}

impl SqliteBackend {
    /// Appends a version of a logical resource and makes it current.
    ///
    /// Parameter names and code systems are resolved (and created if new)
    /// through the directories of `ctx` before the write transaction starts.
    pub async fn ingest(
        &self,
        ctx: &QueryContext,
        resource: &IndexedResource,
    ) -> StorageResult<IngestedVersion> {
        let tables = ctx.catalog().tables(&resource.resource_type)?;

        let mut keys = Vec::with_capacity(resource.values.len());
        for indexed in &resource.values {
            let name_id = ctx.names().resolve_or_create(&indexed.name).await?;
            let system_id = match indexed.value.code_system() {
                Some(system) => Some(ctx.code_systems().resolve_or_create(system).await?),
                None => None,
            };
            keys.push(ValueKeys { name_id, system_id });
        }

        let data = serde_json::to_vec(&resource.data)?;
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT LOGICAL_RESOURCE_ID FROM {} WHERE LOGICAL_ID = ?1",
                    tables.logical_resources()
                ),
                [&resource.logical_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read logical resource: {}", e)))?;

        let logical_resource_id = match existing {
            Some(id) => id,
            None => {
                let id = next_id(&tx)?;
                tx.execute(
                    &format!(
                        "INSERT INTO {} (LOGICAL_RESOURCE_ID, LOGICAL_ID) VALUES (?1, ?2)",
                        tables.logical_resources()
                    ),
                    params![id, resource.logical_id],
                )
                .map_err(|e| internal_error(format!("Failed to insert logical resource: {}", e)))?;
                id
            }
        };

        let version_id: i64 = tx
            .query_row(
                &format!(
                    "SELECT COALESCE(MAX(VERSION_ID), 0) + 1 FROM {} WHERE LOGICAL_RESOURCE_ID = ?1",
                    tables.resources()
                ),
                [logical_resource_id],
                |row| row.get(0),
            )
            .map_err(|e| internal_error(format!("Failed to read version: {}", e)))?;

        let resource_id = next_id(&tx)?;
        tx.execute(
            &format!(
                "INSERT INTO {} (RESOURCE_ID, LOGICAL_RESOURCE_ID, VERSION_ID, LAST_UPDATED, IS_DELETED, DATA) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                tables.resources()
            ),
            params![
                resource_id,
                logical_resource_id,
                version_id,
                format_timestamp(&resource.last_updated),
                if resource.deleted { "Y" } else { "N" },
                data
            ],
        )
        .map_err(|e| internal_error(format!("Failed to insert resource version: {}", e)))?;

        for (indexed, keys) in resource.values.iter().zip(&keys) {
            insert_value(&tx, &tables, *keys, resource_id, &indexed.value)?;
        }

        tx.execute(
            &format!(
                "UPDATE {} SET CURRENT_RESOURCE_ID = ?1 WHERE LOGICAL_RESOURCE_ID = ?2",
                tables.logical_resources()
            ),
            params![resource_id, logical_resource_id],
        )
        .map_err(|e| internal_error(format!("Failed to move current version: {}", e)))?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit: {}", e)))?;

        debug!(
            resource_type = %resource.resource_type,
            logical_id = %resource.logical_id,
            version_id,
            values = resource.values.len(),
            "ingested resource version"
        );

        Ok(IngestedVersion {
            logical_resource_id,
            resource_id,
            version_id,
        })
    }
}
