use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::HarvestError;

/// One cell of a metadata table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Interprets a raw CSV field.
    ///
    /// Empty fields are `Null`. A field only becomes numeric when the number
    /// prints back to exactly the same text, so accession-like values such as
    /// `007` or `1.50` keep their spelling. Typing is decided from the text
    /// alone: a `Text` cell that reads as a canonical number, such as a
    /// normalized contact name `12`, comes back as a number after a write
    /// and reload.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(number) = raw.parse::<i64>() {
            if number.to_string() == raw {
                return Value::Integer(number);
            }
        }
        if let Ok(number) = raw.parse::<f64>() {
            if number.is_finite() && number.to_string() == raw {
                return Value::Float(number);
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Rows of [`Value`]s under an ordered header.
///
/// Every row holds exactly one cell per column; absent fields are
/// [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn column_index_ignore_case(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }
}

/// Reads one comma-delimited file with a header row.
pub fn load_csv(path: &Path) -> Result<Table, HarvestError> {
    let read_err = |message: String| HarvestError::CsvRead {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|err| read_err(err.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|err| read_err(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut table = Table::new(dedup_headers(headers));

    for record in reader.records() {
        let record = record.map_err(|err| read_err(err.to_string()))?;
        table.rows.push(record.iter().map(Value::parse).collect());
    }
    Ok(table)
}

/// Writes the header and every row; there is no index column.
pub fn write_csv(path: &Path, table: &Table) -> Result<(), HarvestError> {
    let write_err = |message: String| HarvestError::CsvWrite {
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| write_err(err.to_string()))?;
    }
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|err| write_err(err.to_string()))?;
    writer
        .write_record(&table.columns)
        .map_err(|err| write_err(err.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|value| value.to_string()))
            .map_err(|err| write_err(err.to_string()))?;
    }
    writer.flush().map_err(|err| write_err(err.to_string()))?;
    Ok(())
}

// Repeated header names get `.1`, `.2`, ... so every column stays addressable.
fn dedup_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{header}.{suffix}");
            suffix += 1;
        }
        out.push(candidate);
    }
    out
}
