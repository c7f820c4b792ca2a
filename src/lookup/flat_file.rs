//! Flat-file (CSV) lookup backend.
//!
//! Rows are `<ip-literal>, <city>, <country>` with no header. The whole file
//! is loaded into memory once; after construction the table is immutable, so
//! concurrent lookups share it without locking.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use super::{LookupError, LookupRecord, ProviderError};

/// Minimum number of fields for a usable row.
const MIN_FIELDS: usize = 3;

/// Summary of a CSV load, logged at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvLoadStats {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub skipped_rows: usize,
    pub unique_ips: usize,
}

/// In-memory table loaded from a CSV file.
#[derive(Debug)]
pub struct CsvProvider {
    records: HashMap<String, LookupRecord>,
    stats: CsvLoadStats,
}

impl CsvProvider {
    /// Load the table from a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Io`] if the file cannot be opened and
    /// [`ProviderError::Csv`] if it cannot be read as CSV.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Initializing CSV provider");

        let file = File::open(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let provider = Self::from_reader(file)?;

        let stats = provider.stats;
        info!(
            path = %path.display(),
            total_rows = stats.total_rows,
            valid_rows = stats.valid_rows,
            skipped_rows = stats.skipped_rows,
            unique_ips = stats.unique_ips,
            "CSV provider initialized"
        );
        Ok(provider)
    }

    /// Load the table from any reader.
    ///
    /// Rows with fewer than three fields are skipped. When an IP appears more
    /// than once the last row wins.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Csv`] on I/O failure or invalid UTF-8.
    pub fn from_reader(reader: impl Read) -> Result<Self, ProviderError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut records = HashMap::new();
        let mut stats = CsvLoadStats::default();

        for (index, row) in reader.records().enumerate() {
            let row = row?;
            stats.total_rows += 1;

            let (Some(ip), Some(city), Some(country)) = (row.get(0), row.get(1), row.get(2))
            else {
                debug!(
                    row_number = index + 1,
                    columns = row.len(),
                    min_columns = MIN_FIELDS,
                    "Skipping invalid row"
                );
                stats.skipped_rows += 1;
                continue;
            };

            records.insert(ip.to_string(), LookupRecord::new(city, country));
            stats.valid_rows += 1;
        }

        stats.unique_ips = records.len();
        Ok(Self { records, stats })
    }

    /// Look up an IP literal.
    pub fn lookup(&self, ip: &str) -> Result<LookupRecord, LookupError> {
        self.records.get(ip).cloned().ok_or(LookupError::NotFound)
    }

    /// Load statistics.
    pub fn stats(&self) -> CsvLoadStats {
        self.stats
    }

    /// Number of distinct IPs in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
