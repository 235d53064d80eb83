//! Keyed CSV parameter tables
//!
//! A table is read from a UTF-8 CSV with a header row. One column is the
//! integer key (typically a land-cover code); every cell of a row is kept
//! under its header name after a smart cast to integer, float or text.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A smart-cast table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Cast to i64, then f64, falling back to text
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    /// Integer view; floats qualify only when they hold a whole number
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One table row, keyed by header name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Rows of a CSV table indexed by an integer key column
#[derive(Debug, Clone)]
pub struct LookupTable {
    path: PathBuf,
    key_field: String,
    columns: Vec<String>,
    rows: BTreeMap<i64, Record>,
}

impl LookupTable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: i64) -> Option<&Record> {
        self.rows.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.keys().copied()
    }

    /// Rows in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Record)> {
        self.rows.iter().map(|(k, r)| (*k, r))
    }

    /// Fail with [`Error::Schema`] unless every named column is present
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.has_column(name) {
                return Err(self.schema_error(format!("missing column '{}'", name)));
            }
        }
        Ok(())
    }

    /// Numeric field of the row at `key`
    pub fn f64_field(&self, key: i64, field: &str) -> Result<f64> {
        let record = self
            .get(key)
            .ok_or_else(|| self.schema_error(format!("no row for key {}", key)))?;
        self.record_f64(key, record, field)
    }

    /// Numeric field of an already fetched row
    pub fn record_f64(&self, key: i64, record: &Record, field: &str) -> Result<f64> {
        match record.get(field) {
            Some(value) => value.as_f64().ok_or_else(|| {
                self.schema_error(format!(
                    "field '{}' of key {} is not numeric: '{}'",
                    field, key, value
                ))
            }),
            None => Err(self.schema_error(format!("key {} has no field '{}'", key, field))),
        }
    }

    /// Integer field of an already fetched row
    pub fn record_i64(&self, key: i64, record: &Record, field: &str) -> Result<i64> {
        match record.get(field) {
            Some(value) => value.as_i64().ok_or_else(|| {
                self.schema_error(format!(
                    "field '{}' of key {} is not an integer: '{}'",
                    field, key, value
                ))
            }),
            None => Err(self.schema_error(format!("key {} has no field '{}'", key, field))),
        }
    }

    pub fn schema_error(&self, detail: String) -> Error {
        Error::Schema {
            path: self.path.clone(),
            detail,
        }
    }
}

/// Load a CSV table keyed by the integer column `key_field`.
///
/// Blank rows are skipped. A missing key column is [`Error::Schema`], a
/// repeated key is [`Error::Duplicate`].
pub fn load_table<P: AsRef<Path>>(path: P, key_field: &str) -> Result<LookupTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::from_io(e, path))?;
    let csv_err = |e: csv::Error| Error::Schema {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let key_index = columns
        .iter()
        .position(|c| c == key_field)
        .ok_or_else(|| Error::Schema {
            path: path.to_path_buf(),
            detail: format!("missing key column '{}'", key_field),
        })?;

    let mut rows = BTreeMap::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let raw_key = record.get(key_index).unwrap_or("");
        let key = Value::parse(raw_key).as_i64().ok_or_else(|| Error::Schema {
            path: path.to_path_buf(),
            detail: format!(
                "row {}: key '{}' in column '{}' is not an integer",
                line + 2,
                raw_key,
                key_field
            ),
        })?;

        let fields = columns
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.clone(), Value::parse(cell)))
            .collect();

        if rows.insert(key, Record { fields }).is_some() {
            return Err(Error::Duplicate {
                path: path.to_path_buf(),
                key,
            });
        }
    }

    tracing::debug!(
        "Loaded {} rows keyed by '{}' from {}",
        rows.len(),
        key_field,
        path.display()
    );

    Ok(LookupTable {
        path: path.to_path_buf(),
        key_field: key_field.to_string(),
        columns,
        rows,
    })
}
