//! Common types used throughout listing-relay
//!
//! This module contains the shared data model (items and pages of a
//! cursor-paginated listing) plus small utility types used across modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Query parameters, ordered so equal parameter sets compare and hash equal
pub type Params = BTreeMap<String, String>;

// ============================================================================
// Listing Data Model
// ============================================================================

/// A single platform record
///
/// Identity is defined solely by `id`; the payload is carried untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the listing
    pub id: String,
    /// Upstream thing kind (e.g. `t1` comment, `t3` post), when provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Full record payload
    #[serde(default)]
    pub data: JsonValue,
}

impl Item {
    /// Create an item with an empty payload
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            data: JsonValue::Null,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    /// Attach a kind
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Read a string field from the payload
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(JsonValue::as_str)
    }

    /// Read an integer field from the payload
    pub fn i64_field(&self, field: &str) -> Option<i64> {
        self.data.get(field).and_then(JsonValue::as_i64)
    }
}

/// Result of one page fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Items in upstream order
    pub items: Vec<Item>,
    /// Cursor for the following page; `None` means the listing is exhausted
    #[serde(rename = "after")]
    pub next_cursor: Option<String>,
}

impl Page {
    /// Create a page
    pub fn new(items: Vec<Item>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            next_cursor: next_cursor.none_if_empty(),
        }
    }

    /// Whether this page ends the listing
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none() || self.items.is_empty()
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Parse `key=value` pairs into ordered params
pub fn parse_params<I, S>(pairs: I) -> crate::Result<Params>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = Params::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            crate::Error::invalid_value("param", format!("expected k=v, got '{pair}'"))
        })?;
        if key.is_empty() {
            return Err(crate::Error::invalid_value("param", "empty key"));
        }
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}
