//! Typed query predicates.
//!
//! A [`Filter`] is a small serializable tree of `(field, operator, value)`
//! tests. It can cross the C ABI as JSON, where a Rust closure cannot.
//! Fields are dotted paths resolved with [`Document::value_at`].
//!
//! ```rust
//! use storefront_core::Filter;
//! use serde_json::json;
//!
//! let filter: Filter = serde_json::from_value(json!({
//!     "op": "and",
//!     "filters": [
//!         {"op": "eq", "field": "status", "value": "pending"},
//!         {"op": "eq_ignore_case", "field": "shippingInfo.email", "value": "jane@example.com"}
//!     ]
//! }))?;
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Exact JSON equality.
    Eq { field: String, value: JsonValue },
    /// String equality after lower-casing both sides. Whitespace is
    /// significant.
    EqIgnoreCase { field: String, value: String },
    /// Case-insensitive substring match on a string field.
    Contains { field: String, value: String },
    /// The field is present and not null.
    Exists { field: String },
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
    Not { filter: Box<Filter> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn eq_ignore_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::EqIgnoreCase {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists {
            field: field.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    /// Evaluates the filter against one document.
    ///
    /// An empty `And` matches everything, an empty `Or` matches nothing.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.value_at(field) == Some(value),
            Filter::EqIgnoreCase { field, value } => doc
                .str_at(field)
                .is_some_and(|s| s.to_lowercase() == value.to_lowercase()),
            Filter::Contains { field, value } => doc
                .str_at(field)
                .is_some_and(|s| s.to_lowercase().contains(&value.to_lowercase())),
            Filter::Exists { field } => doc.value_at(field).is_some_and(|v| !v.is_null()),
            Filter::And { filters } => filters.iter().all(|f| f.matches(doc)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(doc)),
            Filter::Not { filter } => !filter.matches(doc),
        }
    }
}
