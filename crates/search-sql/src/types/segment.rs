//! Query segments: the unit of WHERE-clause composition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Timestamp parameter, bound as an RFC 3339 string.
    Timestamp(DateTime<Utc>),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a float parameter.
    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }

    /// Creates a timestamp parameter.
    pub fn timestamp(t: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(t)
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        SqlParam::String(s.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        SqlParam::String(s)
    }
}

impl From<i64> for SqlParam {
    fn from(i: i64) -> Self {
        SqlParam::Integer(i)
    }
}

impl From<f64> for SqlParam {
    fn from(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

/// A boolean SQL predicate for one constraint plus its ordered bind values.
///
/// The predicate may reference the `R` (resource version) and `LR` (logical
/// resource) aliases of the enclosing query, and uses `?` placeholders that
/// correspond left to right with `binds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySegment {
    predicate: String,
    binds: Vec<SqlParam>,
}

impl QuerySegment {
    /// Creates a segment.
    pub fn new(predicate: impl Into<String>, binds: Vec<SqlParam>) -> Self {
        Self {
            predicate: predicate.into(),
            binds,
        }
    }

    /// Creates a segment that matches when the resource has a row in
    /// `value_table` for `parameter_name_id` satisfying `value_predicate`.
    ///
    /// `value_predicate` refers to the parameter row through the alias `P`,
    /// e.g. `P.STR_VALUE = ?`.
    pub fn parameter_match(
        value_table: &str,
        parameter_name_id: i64,
        value_predicate: &str,
        binds: Vec<SqlParam>,
    ) -> Self {
        Self::new(
            format!(
                "EXISTS (SELECT 1 FROM {} P WHERE P.RESOURCE_ID = R.RESOURCE_ID AND P.PARAMETER_NAME_ID = {} AND ({}))",
                value_table, parameter_name_id, value_predicate
            ),
            binds,
        )
    }

    /// Returns the predicate text.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Returns the bind values in placeholder order.
    pub fn binds(&self) -> &[SqlParam] {
        &self.binds
    }
}

/// A compiled, executable statement: SQL text plus its ordered bind values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    /// The statement text with `?` placeholders.
    pub sql: String,
    /// Bind values, one per placeholder, left to right.
    pub binds: Vec<SqlParam>,
}

impl SqlQuery {
    /// Creates a query.
    pub fn new(sql: impl Into<String>, binds: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_match_shape() {
        let seg = QuerySegment::parameter_match(
            "Patient_STR_VALUES",
            7,
            "P.STR_VALUE = ?",
            vec![SqlParam::string("Smith")],
        );
        assert!(seg.predicate().starts_with("EXISTS (SELECT 1 FROM Patient_STR_VALUES P"));
        assert!(seg.predicate().contains("P.PARAMETER_NAME_ID = 7"));
        assert_eq!(seg.binds(), &[SqlParam::string("Smith")]);
    }

    #[test]
    fn test_param_conversions() {
        assert_eq!(SqlParam::from("a"), SqlParam::String("a".to_string()));
        assert_eq!(SqlParam::from(3i64), SqlParam::Integer(3));
    }
}
