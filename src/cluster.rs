use std::sync::Arc;

use tracing::debug;

use crate::dataset::{Dataset, Record};
use crate::index::IdentityIndex;

// ------------- ClusterEngine -------------
// A cluster is the direct neighbourhood of one seed: every record sharing at
// least one non-empty identity value with it. Records related to the seed only
// through a third record are not part of it, so clusters are not connected
// components and Cluster(a) may differ from Cluster(b) for b in Cluster(a).
pub struct ClusterEngine {
    dataset: Arc<Dataset>,
    index: Arc<IdentityIndex>,
    primary_id: Option<String>,
}
impl ClusterEngine {
    pub fn new(dataset: Arc<Dataset>, index: Arc<IdentityIndex>, primary_id: Option<String>) -> Self {
        // ordering falls back to row order when the primary column is absent
        let primary_id = primary_id.filter(|column| dataset.schema().contains(column));
        Self {
            dataset,
            index,
            primary_id,
        }
    }
    pub fn primary_id(&self) -> Option<&str> {
        self.primary_id.as_deref()
    }
    pub fn cluster(&self, seed: &Record) -> Vec<Arc<Record>> {
        let keys = self
            .index
            .attributes()
            .iter()
            .map(|attribute| (attribute.as_str(), seed.value(attribute)));
        let rows = self.index.any_of(keys);
        let mut members: Vec<Arc<Record>> = rows
            .iter()
            .filter_map(|row_id| self.dataset.get(row_id).ok())
            .collect();
        if let Some(column) = &self.primary_id {
            // stable, so equal identifiers stay in row order
            members.sort_by(|a, b| a.value(column).cmp(b.value(column)));
        }
        debug!(seed = seed.row_id(), members = members.len(), "cluster computed");
        members
    }
}
