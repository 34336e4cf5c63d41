//! Query builder: turns a [`FilterSpec`] into a [`CanonicalQuery`].

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{FilterSpec, is_unconstrained};

/// Normalized, deterministic form of a filter.
///
/// Holds only constrained fields, ordered lexicographically by field
/// name, so two equal filters always yield equal queries (and equal
/// `Display` strings, usable as comparison keys).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CanonicalQuery {
    fields: BTreeMap<&'static str, String>,
}

impl CanonicalQuery {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(field, value)` pairs in canonical order, ready for an HTTP query string.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    fn insert(&mut self, field: &'static str, value: &str) {
        if !is_unconstrained(value) {
            self.fields.insert(field, value.to_string());
        }
    }
}

impl fmt::Display for CanonicalQuery {
    /// Percent-encoded `k=v&k=v`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", k, urlencoding::encode(v))?;
        }
        Ok(())
    }
}

/// Build the canonical query for a filter. Pure; never fails.
pub fn build_query(spec: &FilterSpec) -> CanonicalQuery {
    let mut query = CanonicalQuery::default();
    query.insert("category", &spec.category);
    query.insert("isRead", &spec.is_read);
    query.insert("search", &spec.search);
    query.insert("status", &spec.status);
    query
}
