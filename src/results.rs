//! Decoded result collections and in-memory filtering.
//!
//! [`Results`] is the typed counterpart of a raw query: records decoded
//! from portal JSON, tagged with the academic year and term they were
//! queried for, and filterable by field without further network traffic.

use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::parse::UnitSet;

/// A filter criterion value.
///
/// Text, number and flag criteria match by equality; [`Units`] criteria
/// match when the record's unit set overlaps the given one, which is the
/// natural question for weeks and class periods ("does it meet in week 3?").
///
/// [`Units`]: FilterValue::Units
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Units(UnitSet),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<UnitSet> for FilterValue {
    fn from(value: UnitSet) -> Self {
        Self::Units(value)
    }
}

impl From<u16> for FilterValue {
    fn from(value: u16) -> Self {
        Self::Units(UnitSet::single(value))
    }
}

/// A record type that supports field-name filtering.
pub trait Filterable {
    /// The filterable field names, used to reject unknown criteria keys
    /// before any matching happens.
    fn field_names() -> &'static [&'static str];

    /// Whether this record matches one criterion. `key` is guaranteed to
    /// be one of [`field_names`](Self::field_names).
    fn matches(&self, key: &str, value: &FilterValue) -> bool;
}

/// Records decoded from one query, tagged with the year and term asked for.
///
/// Dereferences to a slice, so iteration and indexing work directly.
#[derive(Debug, Clone)]
pub struct Results<T> {
    year: u16,
    term: u8,
    items: Vec<T>,
}

impl<T> Results<T> {
    /// Academic year the query was made for (e.g. 2023 for 2023-2024).
    #[must_use]
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Term index within the year: 0, 1 or 2.
    #[must_use]
    pub fn term(&self) -> u8 {
        self.term
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T: DeserializeOwned> Results<T> {
    /// Decodes raw portal records into typed ones.
    pub fn load(raw: Vec<Value>, year: u16, term: u8) -> Result<Self> {
        let items = raw
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()?;
        debug!(count = items.len(), year, term, "decoded query records");
        Ok(Self { year, term, items })
    }
}

impl<T: Filterable + Clone> Results<T> {
    /// Returns the records matching every criterion.
    ///
    /// An unknown criterion key is an error rather than an empty result,
    /// so typos surface instead of silently matching nothing.
    pub fn filter(&self, criteria: &[(&str, FilterValue)]) -> Result<Vec<T>> {
        for (key, _) in criteria {
            if !T::field_names().contains(key) {
                return Err(Error::InvalidFilterKey {
                    key: (*key).to_owned(),
                });
            }
        }
        Ok(self
            .items
            .iter()
            .filter(|item| criteria.iter().all(|(key, value)| item.matches(key, value)))
            .cloned()
            .collect())
    }
}

impl<T> Deref for Results<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a Results<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> IntoIterator for Results<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
