//! Statement file parsing
//!
//! Extracts headers and string rows from CSV or JSON without assuming which
//! column means what; the field mapper assigns meaning later.

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Supported statement file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// Format for a file name, or `UnsupportedFormat` with the offending extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(Error::UnsupportedFormat(format!(".{}", other))),
            None => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw tabular content of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub format: FileFormat,
}

impl ParsedData {
    /// The first `n` rows, or all of them when there are fewer
    pub fn preview_rows(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of a header, compared case-insensitively after trimming
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

/// Parse a statement, dispatching on the file extension
pub fn parse_file<R: Read>(filename: &str, reader: R) -> Result<ParsedData> {
    let data = match FileFormat::from_filename(filename)? {
        FileFormat::Csv => parse_csv(reader)?,
        FileFormat::Json => parse_json(reader)?,
    };
    debug!(
        filename,
        format = %data.format,
        columns = data.headers.len(),
        rows = data.rows.len(),
        "Parsed statement file"
    );
    Ok(data)
}

/// First record is the header row; every later record is a data row
pub fn parse_csv<R: Read>(reader: R) -> Result<ParsedData> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(Error::EmptyFile);
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(Error::NoDataRows);
    }

    Ok(ParsedData {
        headers,
        rows,
        format: FileFormat::Csv,
    })
}

/// Top-level array of objects; headers come from the first object's keys
pub fn parse_json<R: Read>(reader: R) -> Result<ParsedData> {
    let records: Vec<Map<String, Value>> = serde_json::from_reader(reader)?;

    let Some(first) = records.first() else {
        return Err(Error::NoRecords);
    };
    let headers: Vec<String> = first.keys().cloned().collect();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map(value_to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(ParsedData {
        headers,
        rows,
        format: FileFormat::Json,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
