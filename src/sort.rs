//! Album sort specifications.
//!
//! An album's sidecar may carry a `sort` field of the form `<basis>` or
//! `-<basis>`:
//!
//! | Spec | Order |
//! |------|-------|
//! | `filename` | natural order of the entry name |
//! | `meta.<key>` | natural order of the entry's `<key>` metadata value (`""` if absent) |
//! | leading `-` | descending |
//!
//! Anything else falls back to `filename` ascending with a warning. The same
//! comparator and direction are applied to each of an album's child lists.

use crate::album::Entry;
use crate::natsort::NaturalKey;
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;

/// What an album's children are ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "key", rename_all = "lowercase")]
pub enum SortBasis {
    Filename,
    Meta(String),
}

/// Parsed sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub basis: SortBasis,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            basis: SortBasis::Filename,
            descending: false,
        }
    }
}

impl SortSpec {
    /// Parse a spec string. Never fails: unknown bases log a warning and
    /// sort by filename ascending.
    pub fn parse(spec: &str) -> Self {
        let trimmed = spec.trim();
        let (descending, basis) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if basis == "filename" {
            return Self {
                basis: SortBasis::Filename,
                descending,
            };
        }
        if let Some(key) = basis.strip_prefix("meta.")
            && !key.is_empty()
        {
            return Self {
                basis: SortBasis::Meta(key.to_string()),
                descending,
            };
        }

        tracing::warn!("unknown sorting: {spec:?}");
        Self::default()
    }

    /// Read the spec from a metadata `sort` value, defaulting when absent or empty.
    pub fn from_meta(value: &str) -> Self {
        if value.trim().is_empty() {
            Self::default()
        } else {
            Self::parse(value)
        }
    }

    /// The natural-order key for one entry under this spec.
    pub fn key<E: Entry + ?Sized>(&self, entry: &E) -> NaturalKey {
        match &self.basis {
            SortBasis::Filename => NaturalKey::new(entry.name()),
            SortBasis::Meta(key) => NaturalKey::new(&entry.meta().text(key)),
        }
    }

    /// Sort `items` in place. Stable in both directions, so equal keys keep
    /// listing order.
    pub fn apply<E: Entry>(&self, items: &mut [E]) {
        if self.descending {
            items.sort_by_cached_key(|item| Reverse(self.key(item)));
        } else {
            items.sort_by_cached_key(|item| self.key(item));
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        match &self.basis {
            SortBasis::Filename => f.write_str("filename"),
            SortBasis::Meta(key) => write!(f, "meta.{key}"),
        }
    }
}
