//! Resource queries: what to fetch and subscribe to.
//!
//! A query names a resource (table), the order its view is kept in, and an
//! optional equality filter. Identifiers are validated before a query is
//! turned into SQL or a channel name.

use crate::{error::Result, Error, Record, ResourceName, SortSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Resource holding company score cards.
pub const COMPANIES: &str = "companies";
/// Resource holding verified claims.
pub const CLAIMS: &str = "claims";

/// Equality filter on one column, `field=eq.value` in text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Column to compare
    pub field: String,
    /// Value the column must equal, as text
    pub value: String,
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Check a record against this filter.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .as_ref()
            .and_then(scalar_text)
            .is_some_and(|v| v == self.value)
    }

    /// Check a raw row against this filter.
    pub fn matches_row(&self, row: &Value) -> bool {
        row.get(&self.field)
            .and_then(scalar_text)
            .is_some_and(|v| v == self.value)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=eq.{}", self.field, self.value)
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (field, value) = s
            .split_once("=eq.")
            .ok_or_else(|| Error::InvalidPayload(format!("unsupported filter: {s}")))?;
        validate_identifier(field)?;
        Ok(Filter::eq(field, value))
    }
}

/// A resource, its view order, and an optional filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    /// Resource (table) name
    pub resource: ResourceName,
    /// Order of the view
    pub order: SortSpec,
    /// Optional equality filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

impl ResourceQuery {
    /// Create an unfiltered query.
    pub fn new(resource: impl Into<ResourceName>, order: SortSpec) -> Self {
        Self {
            resource: resource.into(),
            order,
            filter: None,
        }
    }

    /// Add a filter (builder pattern).
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// All companies, highest TCI score first.
    pub fn companies() -> Self {
        Self::new(COMPANIES, SortSpec::descending("tci_score"))
    }

    /// A single company by key.
    pub fn company(id: impl Into<String>) -> Self {
        Self::companies().with_filter(Filter::eq("id", id))
    }

    /// Claims of one company, newest first.
    pub fn claims_for(company_id: impl Into<String>) -> Self {
        Self::new(CLAIMS, SortSpec::descending("created_at"))
            .with_filter(Filter::eq("company_id", company_id))
    }

    /// Validate every identifier in the query.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.resource)?;
        validate_identifier(&self.order.field)?;
        if let Some(filter) = &self.filter {
            validate_identifier(&filter.field)?;
        }
        Ok(())
    }

    /// Check whether a record is in scope for this query.
    pub fn admits(&self, record: &Record) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(record))
    }

    /// Human-readable channel name for this query.
    pub fn channel_name(&self) -> String {
        match &self.filter {
            None => format!("{}-changes", self.resource),
            Some(filter) => format!("{}-{}", self.resource, filter.value),
        }
    }
}

/// Check that a name is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}
