//! Append-only edit journal.
//!
//! Edits never touch the loaded [`Dataset`]. Each committed edit becomes one
//! complete row in a delimited journal file: a value for every schema column
//! (posted values where given, the dataset's values otherwise), followed by
//! the row index and the edit timestamp. The file is only ever appended to;
//! its header is written once, when the file is first created.
//!
//! Appends are serialized with a mutex and every entry is staged in memory
//! before a single `write_all`, so concurrent edits never interleave. When a
//! write fails the file is cut back to its previous length.
//!
//! The mutex also guards the header the journal is bound to. An append made
//! with a dataset whose columns differ from that header is refused, and a
//! reload rebinds the header under the same lock, so an edit racing a reload
//! can never write rows of the wrong width.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SubsecRound, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, RowId, Schema, EDITED_AT_COLUMN, ROW_INDEX_COLUMN};
use crate::error::{ContractError, Result};
use crate::registry::EditPayload;

const BOM: &[u8] = b"\xEF\xBB\xBF";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ------------- JournalEntry -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    row_id: RowId,
    edited_at: DateTime<Utc>,
    values: Vec<String>, // in schema order
}
impl JournalEntry {
    pub fn row_id(&self) -> RowId {
        self.row_id
    }
    pub fn edited_at(&self) -> DateTime<Utc> {
        self.edited_at
    }
    pub fn values(&self) -> &[String] {
        &self.values
    }
    pub fn value(&self, schema: &Schema, column: &str) -> Option<&str> {
        schema
            .position(column)
            .and_then(|position| self.values.get(position))
            .map(String::as_str)
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn journal_header(schema: &Schema) -> Vec<String> {
    let mut header = schema.columns().to_vec();
    header.push(ROW_INDEX_COLUMN.to_owned());
    header.push(EDITED_AT_COLUMN.to_owned());
    header
}

fn ends_with_terminator(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(matches!(last[0], b'\n' | b'\r'))
}

fn io_error(path: &Path, e: std::io::Error) -> ContractError {
    ContractError::Journal(format!("{}: {e}", path.display()))
}

// ------------- EditJournal -------------
#[derive(Debug)]
pub struct EditJournal {
    path: PathBuf,
    delimiter: u8,
    // expected header; held for every write
    writer: Mutex<Vec<String>>,
}
impl EditJournal {
    /// Opens (but does not create) the journal at `path`. An existing journal
    /// must carry the header this schema would produce.
    pub fn open(path: impl Into<PathBuf>, delimiter: u8, schema: &Schema) -> Result<Self> {
        let expected = journal_header(schema);
        let journal = Self {
            path: path.into(),
            delimiter,
            writer: Mutex::new(expected.clone()),
        };
        journal.verify(&expected)?;
        Ok(journal)
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }
    fn existing_header(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let source = bytes.strip_prefix(BOM).unwrap_or(bytes);
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(source);
        let header = reader.headers().map_err(|e| ContractError::DataCorruption {
            message: format!("unreadable journal header: {e}"),
        })?;
        Ok(header.iter().map(|c| c.trim().to_owned()).collect())
    }
    fn verify(&self, expected: &[String]) -> Result<()> {
        let Some(bytes) = self.read()? else {
            return Ok(());
        };
        let found = self.existing_header(&bytes)?;
        if found != expected {
            return Err(ContractError::Configuration(format!(
                "journal {} has header {:?} but the dataset needs {:?}",
                self.path.display(),
                found,
                expected
            )));
        }
        Ok(())
    }
    /// Binds the journal to `schema`. The existing file is checked and `swap`
    /// runs while appends are held off; the binding only changes when both
    /// succeed.
    pub fn rebind<T>(&self, schema: &Schema, swap: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut bound = self.writer.lock()?;
        let expected = journal_header(schema);
        self.verify(&expected)?;
        let swapped = swap()?;
        *bound = expected;
        Ok(swapped)
    }
    pub fn append(&self, dataset: &Dataset, row_id: RowId, payload: &EditPayload) -> Result<JournalEntry> {
        self.append_at(dataset, row_id, payload, Utc::now())
    }
    pub fn append_at(
        &self,
        dataset: &Dataset,
        row_id: RowId,
        payload: &EditPayload,
        edited_at: DateTime<Utc>,
    ) -> Result<JournalEntry> {
        let original = dataset.get(row_id)?;
        if let Some(posted) = payload.get(ROW_INDEX_COLUMN) {
            if posted.trim() != row_id.to_string() {
                return Err(ContractError::Validation(format!(
                    "payload targets row {posted} but was submitted for row {row_id}"
                )));
            }
        }
        let schema = dataset.schema();
        let values: Vec<String> = schema
            .columns()
            .iter()
            .map(|column| {
                payload
                    .get(column)
                    .unwrap_or_else(|| original.value(column))
                    .to_owned()
            })
            .collect();
        let entry = JournalEntry {
            row_id,
            edited_at: edited_at.trunc_subsecs(0),
            values,
        };
        let mut row = entry.values.clone();
        row.push(row_id.to_string());
        row.push(format_timestamp(&entry.edited_at));

        let bound = self.writer.lock()?;
        if journal_header(schema) != *bound {
            return Err(ContractError::Configuration(format!(
                "dataset columns differ from those journal {} is bound to",
                self.path.display()
            )));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        let before = file.metadata().map_err(|e| io_error(&self.path, e))?.len();
        let header = (before == 0).then(|| bound.clone());
        let mut staged = self.stage(header.as_deref(), &row)?;
        if before > 0 && !ends_with_terminator(&mut file, before).map_err(|e| io_error(&self.path, e))? {
            // an unterminated last line must not swallow this entry
            staged.insert(0, b'\n');
        }
        if let Err(e) = file.write_all(&staged).and_then(|()| file.sync_data()) {
            // take back whatever part of the entry made it to disk
            if let Err(rollback) = file.set_len(before) {
                warn!(path = %self.path.display(), error = %rollback, "could not roll back a failed append");
            }
            return Err(io_error(&self.path, e));
        }
        info!(row = row_id, edited_at = %format_timestamp(&entry.edited_at), "edit appended to journal");
        Ok(entry)
    }
    fn stage(&self, header: Option<&[String]>, row: &[String]) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        if let Some(header) = header {
            writer
                .write_record(header)
                .map_err(|e| ContractError::Journal(e.to_string()))?;
        }
        writer
            .write_record(row)
            .map_err(|e| ContractError::Journal(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| ContractError::Journal(e.to_string()))
    }
    /// Replays every entry in append order.
    pub fn entries(&self, schema: &Schema) -> Result<Vec<JournalEntry>> {
        let bytes = {
            let _guard = self.writer.lock()?;
            self.read()?
        };
        let Some(bytes) = bytes else {
            return Ok(Vec::new());
        };
        let expected = journal_header(schema);
        if self.existing_header(&bytes)? != expected {
            return Err(ContractError::Configuration(format!(
                "journal {} does not match the dataset schema",
                self.path.display()
            )));
        }
        let source = bytes.strip_prefix(BOM).unwrap_or(&bytes);
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_reader(source);
        let mut entries = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let corrupt = |message: String| ContractError::DataCorruption {
                message: format!("journal entry {line}: {message}"),
            };
            let row = row.map_err(|e| corrupt(e.to_string()))?;
            if row.len() != expected.len() {
                return Err(corrupt(format!("{} cells, expected {}", row.len(), expected.len())));
            }
            let mut values: Vec<String> = row.iter().map(str::to_owned).collect();
            let (Some(edited_at), Some(row_id)) = (values.pop(), values.pop()) else {
                return Err(corrupt("missing metadata".into()));
            };
            let row_id = row_id
                .trim()
                .parse::<RowId>()
                .map_err(|e| corrupt(format!("bad row index '{row_id}': {e}")))?;
            let edited_at = DateTime::parse_from_rfc3339(edited_at.trim())
                .map_err(|e| corrupt(format!("bad timestamp '{edited_at}': {e}")))?
                .with_timezone(&Utc);
            entries.push(JournalEntry {
                row_id,
                edited_at,
                values,
            });
        }
        debug!(entries = entries.len(), "journal replayed");
        Ok(entries)
    }
}
