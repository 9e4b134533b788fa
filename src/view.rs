use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dataset::{Dataset, Record, RowId};
use crate::error::Result;
use crate::journal::JournalEntry;

// ------------- CurrentView -------------
// The "current" state of a row is never stored. It is derived by replaying the
// journal in append order over the original values: for each column the latest
// entry holding a non-empty value wins, otherwise the dataset value stands.
#[derive(Debug, Clone)]
pub struct CurrentView {
    pub record: Record,
    pub edits: usize,
    pub last_edited_at: Option<DateTime<Utc>>,
}

pub fn current(dataset: &Dataset, entries: &[JournalEntry], row_id: RowId) -> Result<CurrentView> {
    let original = dataset.get(row_id)?;
    let mut values = original.values().to_vec();
    let mut edits = 0;
    let mut last_edited_at = None;
    for entry in entries.iter().filter(|entry| entry.row_id() == row_id) {
        for (value, edited) in values.iter_mut().zip(entry.values()) {
            if !edited.is_empty() {
                value.clone_from(edited);
            }
        }
        edits += 1;
        last_edited_at = Some(entry.edited_at());
    }
    Ok(CurrentView {
        record: Record::new(row_id, dataset.shared_schema(), values),
        edits,
        last_edited_at,
    })
}

/// Current views for a batch of records, e.g. the members of a cluster.
pub fn current_all(dataset: &Dataset, entries: &[JournalEntry], records: &[Arc<Record>]) -> Result<Vec<CurrentView>> {
    records
        .iter()
        .map(|record| current(dataset, entries, record.row_id()))
        .collect()
}
