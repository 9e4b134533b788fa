use std::collections::HashMap;

// used for internal row sets
use roaring::RoaringTreemap;
use tracing::debug;

use crate::dataset::{ColumnHasher, Dataset, RowId};

// ------------- Lookups -------------
// Inverted index from a cell value to the rows holding it.
#[derive(Debug, Default)]
pub struct Lookup {
    index: HashMap<String, RoaringTreemap, ColumnHasher>,
}
impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, key: &str, row_id: RowId) {
        match self.index.get_mut(key) {
            Some(rows) => {
                rows.insert(row_id);
            }
            None => {
                let mut rows = RoaringTreemap::new();
                rows.insert(row_id);
                self.index.insert(key.to_owned(), rows);
            }
        }
    }
    pub fn lookup(&self, key: &str) -> Option<&RoaringTreemap> {
        self.index.get(key)
    }
    pub fn distinct(&self) -> usize {
        self.index.len()
    }
}

// ------------- IdentityIndex -------------
// One lookup per identity attribute, built once for a loaded dataset. Empty
// values are indexed too, since an exact match compares the full attribute set.
#[derive(Debug)]
pub struct IdentityIndex {
    attributes: Vec<String>,
    lookups: Vec<Lookup>,
}
impl IdentityIndex {
    pub fn build(dataset: &Dataset, attributes: &[String]) -> Self {
        let mut lookups: Vec<Lookup> = attributes.iter().map(|_| Lookup::new()).collect();
        for record in dataset.records() {
            for (attribute, lookup) in attributes.iter().zip(lookups.iter_mut()) {
                lookup.insert(record.value(attribute), record.row_id());
            }
        }
        for (attribute, lookup) in attributes.iter().zip(lookups.iter()) {
            debug!(attribute = %attribute, distinct = lookup.distinct(), "identity attribute indexed");
        }
        Self {
            attributes: attributes.to_vec(),
            lookups,
        }
    }
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
    /// Rows whose value for `attribute` equals `value`. Always a fresh set, so
    /// callers are free to combine it.
    pub fn rows(&self, attribute: &str, value: &str) -> RoaringTreemap {
        self.kept(attribute, value).cloned().unwrap_or_default()
    }
    fn kept(&self, attribute: &str, value: &str) -> Option<&RoaringTreemap> {
        self.attributes
            .iter()
            .position(|a| a == attribute)
            .and_then(|i| self.lookups.get(i))
            .and_then(|lookup| lookup.lookup(value))
    }
    /// Union over every (attribute, value) pair with a non-empty value.
    pub fn any_of<'a, 'b, I>(&self, pairs: I) -> RoaringTreemap
    where
        I: IntoIterator<Item = (&'a str, &'b str)>,
    {
        let mut rows = RoaringTreemap::new();
        for (attribute, value) in pairs {
            if value.is_empty() {
                continue;
            }
            if let Some(kept) = self.kept(attribute, value) {
                rows |= kept;
            }
        }
        rows
    }
}
