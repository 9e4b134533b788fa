// used to read the delimited source
use csv::{ReaderBuilder, StringRecord};

use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use seahash::SeaHasher;
use tracing::info;

use crate::error::{ContractError, Result};

// ------------- RowId -------------
pub type RowId = u64;

pub type ColumnHasher = BuildHasherDefault<SeaHasher>;

// metadata columns appended to every journal entry, so the source may not use them
pub const ROW_INDEX_COLUMN: &str = "_row_index";
pub const EDITED_AT_COLUMN: &str = "_edited_at";

const BOM: &[u8] = b"\xEF\xBB\xBF";

// ------------- Schema -------------
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    positions: HashMap<String, usize, ColumnHasher>,
}
impl Schema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut positions = HashMap::<String, usize, ColumnHasher>::default();
        for (position, column) in columns.iter().enumerate() {
            if column == ROW_INDEX_COLUMN || column == EDITED_AT_COLUMN {
                return Err(ContractError::DataLoad(format!(
                    "column '{column}' is reserved for the edit journal"
                )));
            }
            if positions.insert(column.clone(), position).is_some() {
                return Err(ContractError::DataLoad(format!(
                    "column '{column}' appears more than once in the header"
                )));
            }
        }
        Ok(Self { columns, positions })
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }
    pub fn len(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ------------- Record -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    row_id: RowId,
    schema: Arc<Schema>,
    values: Vec<String>,
}
impl Record {
    pub fn new(row_id: RowId, schema: Arc<Schema>, mut values: Vec<String>) -> Self {
        values.resize(schema.len(), String::new());
        Self {
            row_id,
            schema,
            values,
        }
    }
    pub fn row_id(&self) -> RowId {
        self.row_id
    }
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
    /// The value for a column, or `None` if the column is not in the schema.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.schema
            .position(column)
            .and_then(|position| self.values.get(position))
            .map(String::as_str)
    }
    /// Like [`Record::get`], but a column outside the schema reads as "no value".
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }
    pub fn values(&self) -> &[String] {
        &self.values
    }
    /// Pairs of (column, value) in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schema
            .columns()
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }
}
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {{", self.row_id)?;
        for (i, (column, value)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{column}: {value:?}")?;
        }
        write!(f, "}}")
    }
}

// ------------- Dataset -------------
// Loaded once and never changed. A reload builds a brand new Dataset.
#[derive(Debug)]
pub struct Dataset {
    schema: Arc<Schema>,
    records: Vec<Arc<Record>>,
}
impl Dataset {
    pub fn load(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            ContractError::DataLoad(format!("cannot read dataset at {}: {e}", path.display()))
        })?;
        let dataset = Self::from_reader(bytes.as_slice(), delimiter)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.schema.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }
    pub fn from_reader<R: Read>(mut reader: R, delimiter: u8) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ContractError::DataLoad(e.to_string()))?;
        let source = bytes.strip_prefix(BOM).unwrap_or(&bytes);
        let mut csv = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(source);
        let header = csv
            .headers()
            .map_err(|e| ContractError::DataLoad(format!("unreadable header: {e}")))?;
        let columns: Vec<String> = header.iter().map(|c| c.trim().to_owned()).collect();
        if columns.iter().all(String::is_empty) {
            return Err(ContractError::DataLoad("the header row is empty".into()));
        }
        let schema = Arc::new(Schema::new(columns)?);
        let mut records = Vec::new();
        let mut row = StringRecord::new();
        loop {
            let more = csv
                .read_record(&mut row)
                .map_err(|e| ContractError::DataLoad(format!("unparsable row: {e}")))?;
            if !more {
                break;
            }
            if row.len() > schema.len() {
                return Err(ContractError::DataLoad(format!(
                    "row {} has {} cells but the header names {} columns",
                    records.len(),
                    row.len(),
                    schema.len()
                )));
            }
            let row_id = records.len() as RowId;
            let values = row.iter().map(str::to_owned).collect();
            records.push(Arc::new(Record::new(row_id, Arc::clone(&schema), values)));
        }
        Ok(Self { schema, records })
    }
    pub fn get(&self, row_id: RowId) -> Result<Arc<Record>> {
        usize::try_from(row_id)
            .ok()
            .and_then(|i| self.records.get(i))
            .map(Arc::clone)
            .ok_or_else(|| {
                ContractError::NotFound(format!(
                    "row {row_id} is outside 0..{}",
                    self.records.len()
                ))
            })
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }
    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Result<Dataset> {
        Dataset::from_reader(text.as_bytes(), b',')
    }

    #[test]
    fn row_ids_are_dense_and_in_source_order() {
        let ds = load("id,nome\n7,Ana\n3,Bia\n5,Caio\n").unwrap();
        assert_eq!(ds.len(), 3);
        for (i, record) in ds.records().iter().enumerate() {
            assert_eq!(record.row_id(), i as RowId);
        }
        assert_eq!(ds.get(1).unwrap().value("nome"), "Bia");
    }

    #[test]
    fn bom_and_header_whitespace_are_tolerated() {
        let ds = load("\u{feff} id , nome\n1,Ana\n").unwrap();
        assert_eq!(ds.schema().columns(), &["id".to_string(), "nome".to_string()]);
        assert_eq!(ds.get(0).unwrap().get("id"), Some("1"));
    }

    #[test]
    fn short_rows_are_padded_with_empty_values() {
        let ds = load("a,b,c\n1\n1,2,3\n").unwrap();
        let first = ds.get(0).unwrap();
        assert_eq!(first.values(), &["1".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = load("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ContractError::DataLoad(_)));
    }

    #[test]
    fn reserved_and_duplicate_columns_are_rejected() {
        assert!(matches!(load("a,_row_index\n1,2\n"), Err(ContractError::DataLoad(_))));
        assert!(matches!(load("a,a\n1,2\n"), Err(ContractError::DataLoad(_))));
    }

    #[test]
    fn get_outside_range_is_not_found() {
        let ds = load("a\n1\n").unwrap();
        assert!(matches!(ds.get(1), Err(ContractError::NotFound(_))));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = Dataset::load("/definitely/not/here.csv", b',').unwrap_err();
        assert!(err.is_fatal());
    }
}
