//! # Customer Keys
//!
//! Waiters type customer names freely ("Maria", " maria", "MARIA"). Names are
//! normalized exactly once, here, into a [`CustomerKey`]; every comparison
//! after that is a plain equality check.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Normalized customer grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CustomerKey {
    /// Order carries no customer name.
    Unassigned,
    /// Trimmed, lower-cased name.
    Named(String),
}

impl CustomerKey {
    /// Builds a key from an optional free-text name.
    ///
    /// ## Example
    /// ```rust
    /// use mesa_core::CustomerKey;
    ///
    /// assert_eq!(CustomerKey::from_name(Some(" Maria ")), CustomerKey::from_name(Some("MARIA")));
    /// assert_eq!(CustomerKey::from_name(Some("   ")), CustomerKey::Unassigned);
    /// assert_eq!(CustomerKey::from_name(None), CustomerKey::Unassigned);
    /// ```
    pub fn from_name(name: Option<&str>) -> CustomerKey {
        match name.map(str::trim) {
            Some(trimmed) if !trimmed.is_empty() => CustomerKey::Named(trimmed.to_lowercase()),
            _ => CustomerKey::Unassigned,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, CustomerKey::Unassigned)
    }
}

impl fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerKey::Unassigned => f.write_str("no customer assigned"),
            CustomerKey::Named(name) => f.write_str(name),
        }
    }
}
