use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{SourceConfig, TextEncoding};
use crate::domain::{RawRecord, RawTable};
use crate::error::{IndexerError, Result};

/// Reads the employee export from local disk into a [`RawTable`].
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    encoding: TextEncoding,
    na_values: HashSet<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, encoding: TextEncoding, na_values: &[String]) -> Self {
        Self {
            path: path.into(),
            encoding,
            na_values: na_values.iter().cloned().collect(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.path.clone(), config.encoding, &config.na_values)
    }

    /// Same encoding and missing-value markers, different file.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..self.clone() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole file. Fails before reading anything when the
    /// file does not exist.
    pub fn load(&self) -> Result<RawTable> {
        if !self.path.exists() {
            return Err(IndexerError::SourceMissing(self.path.clone()));
        }

        let bytes = fs::read(&self.path)?;
        let table = self.parse(&decode(&bytes, self.encoding))?;
        info!(
            path = %self.path.display(),
            rows = table.rows.len(),
            "Columns in the CSV: {:?}",
            table.columns
        );
        Ok(table)
    }

    /// Parse already-decoded CSV text.
    pub fn parse(&self, text: &str) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns = dedupe_columns(reader.headers()?.iter());
        let mut rows = Vec::new();

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let line = i + 1;
            if record.len() > columns.len() {
                warn!(line, cells = record.len(), columns = columns.len(), "Row has extra cells, ignoring them");
            }

            let cells = (0..columns.len())
                .map(|c| record.get(c).filter(|v| !self.na_values.contains(*v)).map(|v| v.to_string()))
                .collect();
            rows.push(RawRecord { line, cells });
        }

        Ok(RawTable { columns, rows })
    }
}

fn decode(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        // ISO-8859-1 maps every byte to the code point of the same value
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        TextEncoding::Utf8 => {
            let text = String::from_utf8_lossy(bytes);
            text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string()
        }
    }
}

/// Repeated header names get a `.1`, `.2`, ... suffix so every column stays addressable.
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .map(|h| {
            let count = seen.entry(h.to_string()).or_insert(0);
            let name = if *count == 0 { h.to_string() } else { format!("{}.{}", h, count) };
            *count += 1;
            name
        })
        .collect()
}
