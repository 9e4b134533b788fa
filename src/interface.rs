//! The lookup boundary consumed by the presentation layer.
//!
//! [`ContractInterface`] is the whole surface a UI or router may call:
//! exact and partial identity matches, clustering, record retrieval and
//! appending edits, plus the derived current view and the attachment check.
//!
//! Everything read-only lives in a [`Snapshot`]: the dataset, its field
//! registry, the identity index and the engines built on it. A snapshot is
//! never modified. Reloading builds a complete new snapshot and swaps the
//! shared pointer, so a caller that already holds the old one keeps a
//! consistent view until it drops it. The edit journal is shared across
//! snapshots so that appends stay serialized through a reload.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::attachment;
use crate::cluster::ClusterEngine;
use crate::dataset::{Dataset, Record, RowId};
use crate::error::Result;
use crate::index::IdentityIndex;
use crate::journal::{EditJournal, JournalEntry};
use crate::registry::{EditPayload, FieldRegistry};
use crate::resolver::{IdentityResolver, IdentityValues, PartialMatches};
use crate::settings::Settings;
use crate::view::{self, CurrentView};

/// One immutable generation of everything derived from the dataset.
pub struct Snapshot {
    dataset: Arc<Dataset>,
    registry: FieldRegistry,
    resolver: IdentityResolver,
    cluster: ClusterEngine,
}
impl Snapshot {
    pub fn new(dataset: Dataset, settings: &Settings) -> Result<Self> {
        let dataset = Arc::new(dataset);
        let registry = FieldRegistry::new(dataset.schema().columns())?;
        let index = Arc::new(IdentityIndex::build(&dataset, &settings.identity_attributes));
        let resolver = IdentityResolver::new(
            Arc::clone(&dataset),
            Arc::clone(&index),
            settings.partial_match_cap,
        );
        let cluster = ClusterEngine::new(Arc::clone(&dataset), index, settings.primary_id.clone());
        Ok(Self {
            dataset,
            registry,
            resolver,
            cluster,
        })
    }
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }
    pub fn cluster_engine(&self) -> &ClusterEngine {
        &self.cluster
    }
    /// The record at `row_id` together with its cluster.
    pub fn cluster_of(&self, row_id: RowId) -> Result<(Arc<Record>, Vec<Arc<Record>>)> {
        let seed = self.dataset.get(row_id)?;
        let members = self.cluster.cluster(&seed);
        Ok((seed, members))
    }
}

/// Whether the attachment named by a record is present under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub exists: bool,
}

/// One column of a contract: its form identifier, its label, the loaded
/// value and the value after replaying the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractField {
    pub safe: String,
    pub label: String,
    pub value: String,
    pub current: String,
}

/// Everything shown for a single contract, read from one snapshot.
#[derive(Debug, Clone)]
pub struct ContractView {
    pub row_id: RowId,
    pub fields: Vec<ContractField>,
    pub current: CurrentView,
    pub attachment: Attachment,
}

pub struct ContractInterface {
    settings: Settings,
    snapshot: RwLock<Arc<Snapshot>>,
    journal: Arc<EditJournal>,
}

impl ContractInterface {
    /// Loads the dataset named in the settings and opens the journal.
    pub fn open(settings: Settings) -> Result<Self> {
        let dataset = Dataset::load(&settings.dataset, settings.delimiter_byte())?;
        Self::with_dataset(settings, dataset)
    }
    pub fn with_dataset(settings: Settings, dataset: Dataset) -> Result<Self> {
        let snapshot = Snapshot::new(dataset, &settings)?;
        let journal = EditJournal::open(
            &settings.journal,
            settings.delimiter_byte(),
            snapshot.dataset().schema(),
        )?;
        info!(
            rows = snapshot.dataset().len(),
            identity = ?settings.identity_attributes,
            journal = %settings.journal.display(),
            "contract interface ready"
        );
        Ok(Self {
            settings,
            snapshot: RwLock::new(Arc::new(snapshot)),
            journal: Arc::new(journal),
        })
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        Ok(Arc::clone(&*self.snapshot.read()?))
    }
    pub fn journal(&self) -> &EditJournal {
        &self.journal
    }

    pub fn exact_match(&self, values: &IdentityValues) -> Result<Arc<Record>> {
        self.snapshot()?.resolver().exact_match(values)
    }
    pub fn partial_match(&self, values: &IdentityValues) -> Result<PartialMatches> {
        self.snapshot()?.resolver().partial_match(values)
    }
    pub fn cluster(&self, seed: &Record) -> Result<Vec<Arc<Record>>> {
        Ok(self.snapshot()?.cluster_engine().cluster(seed))
    }
    /// The record at `row_id` together with its cluster.
    pub fn cluster_of(&self, row_id: RowId) -> Result<(Arc<Record>, Vec<Arc<Record>>)> {
        self.snapshot()?.cluster_of(row_id)
    }
    pub fn get(&self, row_id: RowId) -> Result<Arc<Record>> {
        self.snapshot()?.dataset().get(row_id)
    }
    /// Appends an edit keyed by original column names.
    pub fn append(&self, row_id: RowId, payload: &EditPayload) -> Result<JournalEntry> {
        let snapshot = self.snapshot()?;
        self.journal.append(snapshot.dataset(), row_id, payload)
    }
    /// Appends an edit submitted with safe field identifiers. Identifiers that
    /// do not belong to any column are dropped.
    pub fn append_form<I, K, V>(&self, row_id: RowId, form: I) -> Result<(JournalEntry, Vec<String>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let snapshot = self.snapshot()?;
        let payload = snapshot.registry().rehydrate(form);
        let entry = self.journal.append(snapshot.dataset(), row_id, &payload)?;
        Ok((entry, payload.dropped))
    }
    pub fn current(&self, row_id: RowId) -> Result<CurrentView> {
        self.current_in(&*self.snapshot()?, row_id)
    }
    fn current_in(&self, snapshot: &Snapshot, row_id: RowId) -> Result<CurrentView> {
        let entries = self.journal.entries(snapshot.dataset().schema())?;
        view::current(snapshot.dataset(), &entries, row_id)
    }
    pub fn attachment(&self, row_id: RowId) -> Result<Attachment> {
        Ok(self.attachment_of(&*self.get(row_id)?))
    }
    fn attachment_of(&self, record: &Record) -> Attachment {
        let filename = record.value(&self.settings.filename_field).trim().to_owned();
        let exists = attachment::exists(&self.settings.attachments, &filename);
        Attachment { filename, exists }
    }
    /// Fields, current values and attachment of one contract.
    pub fn contract(&self, row_id: RowId) -> Result<ContractView> {
        let snapshot = self.snapshot()?;
        let record = snapshot.dataset().get(row_id)?;
        let current = self.current_in(&snapshot, row_id)?;
        let fields = record
            .fields()
            .zip(current.record.values())
            .map(|((label, value), now)| ContractField {
                safe: snapshot.registry().to_safe(label).unwrap_or(label).to_owned(),
                label: label.to_owned(),
                value: value.to_owned(),
                current: now.clone(),
            })
            .collect();
        Ok(ContractView {
            row_id,
            fields,
            current,
            attachment: self.attachment_of(&record),
        })
    }
    /// Replaces the whole snapshot with a fresh load of the dataset. The old
    /// snapshot stays in place if loading fails. The journal is rebound to the
    /// new columns in the same step, so edits still in flight on the old
    /// snapshot are refused rather than written with the wrong width.
    pub fn reload(&self) -> Result<usize> {
        let dataset = Dataset::load(&self.settings.dataset, self.settings.delimiter_byte())?;
        let snapshot = Arc::new(Snapshot::new(dataset, &self.settings)?);
        let rows = snapshot.dataset().len();
        self.journal.rebind(snapshot.dataset().schema(), || {
            *self.snapshot.write()? = Arc::clone(&snapshot);
            Ok(())
        })?;
        info!(rows, "dataset reloaded");
        Ok(rows)
    }
}
