//! Search parameter types.
//!
//! This module defines the semantic types of search parameters, the value
//! tables they are indexed into, and the sort and inclusion directives that
//! accompany a search request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Semantic types of search parameters.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (_id, _lastUpdated, etc.).
    Special,
}

impl SearchParamType {
    /// Returns the value table this type is indexed into, if any.
    ///
    /// Composite and special parameters have no value table of their own.
    pub fn value_table(&self) -> Option<ValueTable> {
        match self {
            SearchParamType::String | SearchParamType::Reference | SearchParamType::Uri => {
                Some(ValueTable::Str)
            }
            SearchParamType::Date => Some(ValueTable::Date),
            SearchParamType::Token => Some(ValueTable::Token),
            SearchParamType::Number => Some(ValueTable::Number),
            SearchParamType::Quantity => Some(ValueTable::Quantity),
            SearchParamType::Composite | SearchParamType::Special => None,
        }
    }
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// A per-resource-type parameter table kind.
///
/// Every variant owns a `{Type}_{SUFFIX}_VALUES` table and a fixed set of
/// value columns used when a representative value is aggregated for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTable {
    /// `STR_VALUES`: strings, references and URIs.
    Str,
    /// `TOKEN_VALUES`: system/code pairs.
    Token,
    /// `DATE_VALUES`: dates and periods.
    Date,
    /// `NUMBER_VALUES`: decimals and integers.
    Number,
    /// `QUANTITY_VALUES`: value/unit pairs.
    Quantity,
}

impl ValueTable {
    /// All value tables, in schema creation order.
    pub const ALL: [ValueTable; 5] = [
        ValueTable::Str,
        ValueTable::Token,
        ValueTable::Date,
        ValueTable::Number,
        ValueTable::Quantity,
    ];

    /// Returns the table-name suffix, e.g. `STR_VALUES`.
    pub fn suffix(&self) -> &'static str {
        match self {
            ValueTable::Str => "STR_VALUES",
            ValueTable::Token => "TOKEN_VALUES",
            ValueTable::Date => "DATE_VALUES",
            ValueTable::Number => "NUMBER_VALUES",
            ValueTable::Quantity => "QUANTITY_VALUES",
        }
    }

    /// Returns the columns aggregated per resource when sorting.
    ///
    /// Tokens sort on the code system id first, then the code.
    pub fn sort_columns(&self) -> &'static [&'static str] {
        match self {
            ValueTable::Str => &["STR_VALUE"],
            ValueTable::Token => &["CODE_SYSTEM_ID", "TOKEN_VALUE"],
            ValueTable::Date => &["DATE_VALUE"],
            ValueTable::Number => &["NUMBER_VALUE"],
            ValueTable::Quantity => &["QUANTITY_VALUE"],
        }
    }

    /// Returns the physical table name for a resource type.
    pub fn table_name(&self, resource_type: &str) -> String {
        format!("{}_{}", resource_type, self.suffix())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl SortDirection {
    /// Returns the SQL keyword for this direction.
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    /// Returns the aggregate that picks the representative value per resource.
    pub fn aggregate(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "MIN",
            SortDirection::Descending => "MAX",
        }
    }
}

/// A sort key of a search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParameter {
    /// The search parameter name to sort by.
    pub name: String,
    /// The semantic type of the parameter.
    pub param_type: SearchParamType,
    /// The sort direction.
    pub direction: SortDirection,
}

impl SortParameter {
    /// Creates a sort parameter.
    pub fn new(name: impl Into<String>, param_type: SearchParamType, direction: SortDirection) -> Self {
        Self {
            name: name.into(),
            param_type,
            direction,
        }
    }

    /// Parses a `_sort` value (e.g., "-date" for descending).
    pub fn parse(s: &str, param_type: SearchParamType) -> Self {
        if let Some(stripped) = s.strip_prefix('-') {
            Self::new(stripped, param_type, SortDirection::Descending)
        } else {
            Self::new(s, param_type, SortDirection::Ascending)
        }
    }

    /// Returns the value table to join for this key.
    pub fn value_table(&self) -> Result<ValueTable, SearchError> {
        self.param_type
            .value_table()
            .ok_or_else(|| SearchError::UnsupportedSortType {
                parameter: self.name.clone(),
                param_type: self.param_type.to_string(),
            })
    }
}

/// The direction of an inclusion directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeType {
    /// Follow references found on the primary resources (_include).
    Include,
    /// Find resources that reference the primary resources (_revinclude).
    Revinclude,
}

/// An edge to traverse when expanding search results.
///
/// For `_include=Patient:organization` the source type is `Patient` and the
/// target type `Organization`. For `_revinclude=Observation:patient` the join
/// type is `Observation`, whose `patient` values point at the primary type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionParameter {
    /// The kind of inclusion.
    pub include_type: IncludeType,
    /// The reference search parameter to follow.
    pub search_param: String,
    /// The resource type the parameter is defined on.
    pub source_type: String,
    /// The resource type the reference points at.
    pub target_type: String,
    /// For reverse includes, the resource type that holds the references.
    pub join_type: Option<String>,
}

impl InclusionParameter {
    /// Creates an `_include` directive.
    pub fn include(
        source_type: impl Into<String>,
        search_param: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            include_type: IncludeType::Include,
            search_param: search_param.into(),
            source_type: source_type.into(),
            target_type: target_type.into(),
            join_type: None,
        }
    }

    /// Creates a `_revinclude` directive.
    ///
    /// `join_type` holds the references; `target_type` is the primary
    /// resource type they point at.
    pub fn revinclude(
        join_type: impl Into<String>,
        search_param: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        let join_type = join_type.into();
        Self {
            include_type: IncludeType::Revinclude,
            search_param: search_param.into(),
            source_type: join_type.clone(),
            target_type: target_type.into(),
            join_type: Some(join_type),
        }
    }

    /// Returns the resource type whose rows this directive selects.
    pub fn selected_type(&self) -> &str {
        match self.include_type {
            IncludeType::Include => &self.target_type,
            IncludeType::Revinclude => self.join_type.as_deref().unwrap_or(&self.source_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_table_mapping() {
        assert_eq!(SearchParamType::String.value_table(), Some(ValueTable::Str));
        assert_eq!(SearchParamType::Reference.value_table(), Some(ValueTable::Str));
        assert_eq!(SearchParamType::Uri.value_table(), Some(ValueTable::Str));
        assert_eq!(SearchParamType::Date.value_table(), Some(ValueTable::Date));
        assert_eq!(SearchParamType::Token.value_table(), Some(ValueTable::Token));
        assert_eq!(SearchParamType::Number.value_table(), Some(ValueTable::Number));
        assert_eq!(
            SearchParamType::Quantity.value_table(),
            Some(ValueTable::Quantity)
        );
        assert_eq!(SearchParamType::Composite.value_table(), None);
        assert_eq!(SearchParamType::Special.value_table(), None);
    }

    #[test]
    fn test_table_name() {
        assert_eq!(ValueTable::Str.table_name("Patient"), "Patient_STR_VALUES");
        assert_eq!(
            ValueTable::Quantity.table_name("Observation"),
            "Observation_QUANTITY_VALUES"
        );
    }

    #[test]
    fn test_token_sorts_on_two_columns() {
        assert_eq!(
            ValueTable::Token.sort_columns(),
            &["CODE_SYSTEM_ID", "TOKEN_VALUE"]
        );
        assert_eq!(ValueTable::Date.sort_columns().len(), 1);
    }

    #[test]
    fn test_sort_parse() {
        let sort = SortParameter::parse("-birthdate", SearchParamType::Date);
        assert_eq!(sort.name, "birthdate");
        assert_eq!(sort.direction, SortDirection::Descending);

        let sort = SortParameter::parse("family", SearchParamType::String);
        assert_eq!(sort.direction, SortDirection::Ascending);
        assert_eq!(sort.direction.aggregate(), "MIN");
    }

    #[test]
    fn test_unsupported_sort_type() {
        let sort = SortParameter::parse("code-value", SearchParamType::Composite);
        assert!(matches!(
            sort.value_table(),
            Err(SearchError::UnsupportedSortType { .. })
        ));
    }

    #[test]
    fn test_param_type_round_trip_text() {
        assert_eq!("Token".parse::<SearchParamType>(), Ok(SearchParamType::Token));
        assert!("bogus".parse::<SearchParamType>().is_err());
    }

    #[test]
    fn test_inclusion_selected_type() {
        let inc = InclusionParameter::include("Patient", "organization", "Organization");
        assert_eq!(inc.selected_type(), "Organization");

        let rev = InclusionParameter::revinclude("Observation", "patient", "Patient");
        assert_eq!(rev.selected_type(), "Observation");
        assert_eq!(rev.join_type.as_deref(), Some("Observation"));
    }
}
