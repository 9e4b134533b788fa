//! Field registry: a one-to-one mapping between the column names found in the
//! dataset header and identifiers that are safe to use as form field names.
//!
//! Column headers in real spreadsheets contain spaces, accents and punctuation
//! (`"Valor (R$)"`). The registry sanitizes every column once, when the schema
//! is known, and keeps both directions in a [`BiMap`] so a submitted form can
//! be mapped back onto the original columns.

use std::collections::BTreeMap;

// used to keep the one-to-one mapping between columns and their safe identifiers
use bimap::BiMap;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::dataset::{EDITED_AT_COLUMN, ROW_INDEX_COLUMN};
use crate::error::{ContractError, Result};

lazy_static! {
    static ref UNSAFE_RUN: Regex = Regex::new(r"[^0-9a-zA-Z_]+").unwrap();
}

/// Replaces every maximal run of characters outside `[0-9a-zA-Z_]` with a
/// single underscore.
pub fn sanitize(column: &str) -> String {
    UNSAFE_RUN.replace_all(column, "_").into_owned()
}

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    kept: BiMap<String, String>, // original on the left, safe on the right
}
impl FieldRegistry {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept = BiMap::new();
        for column in columns {
            let column = column.as_ref();
            let safe = sanitize(column);
            if let Some(other) = kept.get_by_right(&safe) {
                if other != column {
                    return Err(ContractError::Configuration(format!(
                        "columns '{other}' and '{column}' both sanitize to '{safe}'"
                    )));
                }
                continue;
            }
            kept.insert(column.to_owned(), safe);
        }
        Ok(Self { kept })
    }
    pub fn to_safe(&self, column: &str) -> Option<&str> {
        self.kept.get_by_left(column).map(String::as_str)
    }
    pub fn to_original(&self, safe: &str) -> Option<&str> {
        self.kept.get_by_right(safe).map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
    /// Maps a payload keyed by safe identifiers back onto original column names.
    ///
    /// This is deliberately permissive and lossy: keys that do not correspond to
    /// any known column are dropped rather than rejected. They are reported in
    /// [`EditPayload::dropped`] so a caller can surface them if it wants to.
    /// The journal metadata columns pass through unchanged, so a posted row
    /// index can still be checked against the target row.
    pub fn rehydrate<I, K, V>(&self, form: I) -> EditPayload
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut payload = EditPayload::default();
        for (key, value) in form {
            let key = key.as_ref();
            if key == ROW_INDEX_COLUMN || key == EDITED_AT_COLUMN {
                payload.fields.insert(key.to_owned(), value.into());
                continue;
            }
            match self.to_original(key) {
                Some(column) => {
                    payload.fields.insert(column.to_owned(), value.into());
                }
                None => {
                    debug!(field = key, "dropping unmapped form field");
                    payload.dropped.push(key.to_owned());
                }
            }
        }
        payload
    }
}

/// A closed set of posted values keyed by original column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPayload {
    pub fields: BTreeMap<String, String>,
    pub dropped: Vec<String>,
}
impl EditPayload {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EditPayload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            dropped: Vec::new(),
        }
    }
}
