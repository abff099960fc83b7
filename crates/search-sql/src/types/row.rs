//! Rows returned by compiled data queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;

/// Columns selected for a data row, in projection order.
pub const ROW_COLUMNS: [&str; 7] = [
    "RESOURCE_ID",
    "LOGICAL_RESOURCE_ID",
    "VERSION_ID",
    "LAST_UPDATED",
    "IS_DELETED",
    "DATA",
    "LOGICAL_ID",
];

/// One resource version row materialised from a data query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRow {
    /// Physical version row id.
    pub resource_id: i64,
    /// Logical resource id (stable across versions).
    pub logical_resource_id: i64,
    /// Version number.
    pub version_id: i64,
    /// When this version was written.
    pub last_updated: DateTime<Utc>,
    /// Whether this version is a deletion marker.
    pub is_deleted: bool,
    /// The serialized resource.
    pub data: Vec<u8>,
    /// The logical id, e.g. `patient-123`.
    pub logical_id: String,
}

impl ResourceRow {
    /// Parses `data` as JSON.
    pub fn json(&self) -> StorageResult<Value> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Returns the `resourceType` recorded in the data, if any.
    pub fn resource_type(&self) -> Option<String> {
        self.json()
            .ok()
            .and_then(|v| v.get("resourceType").and_then(Value::as_str).map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_json() {
        let row = ResourceRow {
            resource_id: 2,
            logical_resource_id: 1,
            version_id: 1,
            last_updated: Utc::now(),
            is_deleted: false,
            data: serde_json::to_vec(&json!({"resourceType": "Patient", "id": "p1"})).unwrap(),
            logical_id: "p1".to_string(),
        };
        assert_eq!(row.json().unwrap()["id"], "p1");
        assert_eq!(row.resource_type().as_deref(), Some("Patient"));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let row = ResourceRow {
            resource_id: 1,
            logical_resource_id: 1,
            version_id: 1,
            last_updated: Utc::now(),
            is_deleted: false,
            data: b"not json".to_vec(),
            logical_id: "x".to_string(),
        };
        assert!(row.json().is_err());
        assert!(row.resource_type().is_none());
    }
}
