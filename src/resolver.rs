//! Identity resolution over the configured identity attributes.
//!
//! Two lookups are offered. [`IdentityResolver::exact_match`] picks one seed
//! record whose whole identity tuple equals the query, and
//! [`IdentityResolver::partial_match`] lists candidates sharing any one
//! supplied value, for when no exact seed exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::dataset::{Dataset, Record};
use crate::error::{ContractError, Result};
use crate::index::IdentityIndex;

pub const DEFAULT_PARTIAL_MATCH_CAP: usize = 200;

/// Query values keyed by identity attribute.
pub type IdentityValues = BTreeMap<String, String>;

/// Candidates from a partial match, at most `cap` of them in row order.
#[derive(Debug, Clone)]
pub struct PartialMatches {
    pub records: Vec<Arc<Record>>,
    /// Set when more records qualified than the cap allowed through.
    pub truncated: bool,
}
impl PartialMatches {
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct IdentityResolver {
    dataset: Arc<Dataset>,
    index: Arc<IdentityIndex>,
    cap: usize,
}
impl IdentityResolver {
    pub fn new(dataset: Arc<Dataset>, index: Arc<IdentityIndex>, cap: usize) -> Self {
        Self {
            dataset,
            index,
            cap,
        }
    }
    pub fn cap(&self) -> usize {
        self.cap
    }
    fn supplied<'s, 'v>(&'s self, values: &'v IdentityValues) -> Vec<(&'s str, &'v str)> {
        self.index
            .attributes()
            .iter()
            .map(|attribute| {
                let value = values.get(attribute).map(String::as_str).unwrap_or("");
                (attribute.as_str(), value)
            })
            .collect()
    }
    /// The lowest row whose value for every identity attribute equals the
    /// supplied one. An omitted attribute has to be empty on the record.
    pub fn exact_match(&self, values: &IdentityValues) -> Result<Arc<Record>> {
        let supplied = self.supplied(values);
        if supplied.iter().all(|(_, value)| value.is_empty()) {
            return Err(ContractError::NotFound(
                "no identity value was supplied".into(),
            ));
        }
        let mut candidates = None;
        for (attribute, value) in supplied {
            let rows = self.index.rows(attribute, value);
            candidates = Some(match candidates {
                None => rows,
                Some(kept) => kept & rows,
            });
        }
        let first = candidates.and_then(|rows| rows.min());
        debug!(?values, found = ?first, "exact match");
        match first {
            Some(row_id) => self.dataset.get(row_id),
            None => Err(ContractError::NotFound(format!(
                "no record matches {values:?} exactly"
            ))),
        }
    }
    /// Every record sharing at least one supplied, non-empty identity value,
    /// in row order and cut off at the cap.
    pub fn partial_match(&self, values: &IdentityValues) -> Result<PartialMatches> {
        let rows = self.index.any_of(self.supplied(values));
        let truncated = rows.len() > self.cap as u64;
        let records = rows
            .iter()
            .take(self.cap)
            .map(|row_id| self.dataset.get(row_id))
            .collect::<Result<Vec<_>>>()?;
        debug!(?values, matched = rows.len(), kept = records.len(), truncated, "partial match");
        Ok(PartialMatches { records, truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(text: &str, cap: usize) -> IdentityResolver {
        let dataset = Arc::new(Dataset::from_reader(text.as_bytes(), b',').unwrap());
        let attributes = vec!["cpf".to_string(), "nome".to_string(), "cnpj".to_string()];
        let index = Arc::new(IdentityIndex::build(&dataset, &attributes));
        IdentityResolver::new(dataset, index, cap)
    }

    fn query(pairs: &[(&str, &str)]) -> IdentityValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn exact_match_compares_the_whole_tuple() {
        let r = resolver("cpf,nome,cnpj\n1,Ana,\n1,Ana,9\n1,Ana,9\n", 10);
        let found = r.exact_match(&query(&[("cpf", "1"), ("nome", "Ana"), ("cnpj", "9")])).unwrap();
        assert_eq!(found.row_id(), 1, "lowest row wins a tie");
        let found = r.exact_match(&query(&[("cpf", "1"), ("nome", "Ana")])).unwrap();
        assert_eq!(found.row_id(), 0, "omitted cnpj must be empty on the record");
    }

    #[test]
    fn exact_match_without_values_is_not_found() {
        let r = resolver("cpf,nome,cnpj\n,,\n", 10);
        let err = r.exact_match(&query(&[("cpf", ""), ("nome", "")])).unwrap_err();
        assert!(matches!(err, ContractError::NotFound(_)));
    }

    #[test]
    fn partial_match_ignores_empty_values() {
        let r = resolver("cpf,nome,cnpj\n1,Ana,\n,Bia,\n2,Ana,\n", 10);
        let found = r.partial_match(&query(&[("cpf", ""), ("nome", "Ana")])).unwrap();
        let rows: Vec<_> = found.records.iter().map(|r| r.row_id()).collect();
        assert_eq!(rows, vec![0, 2]);
        assert!(!found.truncated);
    }

    #[test]
    fn partial_match_is_capped() {
        let mut text = String::from("cpf,nome,cnpj\n");
        for _ in 0..5 {
            text.push_str("1,x,\n");
        }
        let r = resolver(&text, 3);
        let found = r.partial_match(&query(&[("cpf", "1")])).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.truncated);
    }
}
