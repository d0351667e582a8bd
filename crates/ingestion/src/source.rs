//! Raw observation loading from CSV exports.
//!
//! Exports come in several parts with a `date` column that may be written as
//! a spreadsheet formula (`="05-01-24"`) and a separate `time` column.

use chrono::NaiveDateTime;
use csv::StringRecord;
use signal_core::config::IngestionConfig;
use signal_core::{Error, RawObservation, Result};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Column positions resolved from a CSV header.
struct ColumnMap {
    date: usize,
    time: usize,
    price: usize,
    volume: usize,
    open_interest: usize,
    implied_volatility: usize,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord, config: &IngestionConfig, origin: &str) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::data(format!("{origin}: missing column '{name}'")))
        };

        Ok(Self {
            date: find(config.date_column.as_str())?,
            time: find(config.time_column.as_str())?,
            price: find(config.price_column.as_str())?,
            volume: find(config.volume_column.as_str())?,
            open_interest: find(config.open_interest_column.as_str())?,
            implied_volatility: find(config.implied_volatility_column.as_str())?,
        })
    }
}

/// Outcome of reading one or more CSV parts.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Parsed observations, in file order.
    pub observations: Vec<RawObservation>,
    /// Rows skipped for missing or non-numeric values.
    pub skipped_rows: usize,
}

/// Reader for raw observation CSV exports.
pub struct ObservationReader {
    config: IngestionConfig,
}

impl ObservationReader {
    /// Create a reader with the given column mapping.
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    /// Read and merge several CSV files.
    pub fn read_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for path in paths {
            let path = path.as_ref();
            let file = std::fs::File::open(path)?;
            let part = self.read(file, &path.display().to_string())?;
            info!(
                file = %path.display(),
                rows = part.observations.len(),
                skipped = part.skipped_rows,
                "loaded observation part"
            );
            report.observations.extend(part.observations);
            report.skipped_rows += part.skipped_rows;
        }
        Ok(report)
    }

    /// Read observations from any CSV source. `origin` names the source in errors.
    pub fn read<R: Read>(&self, source: R, origin: &str) -> Result<LoadReport> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        let headers = reader.headers()?.clone();
        let columns = ColumnMap::resolve(&headers, &self.config, origin)?;

        let mut report = LoadReport::default();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1.
            let line = i + 2;

            let timestamp = self
                .parse_timestamp(&record, &columns)
                .ok_or_else(|| Error::data(format!("{origin}:{line}: unparsable timestamp")))?;

            match parse_values(&record, &columns) {
                Some((price, volume, open_interest, implied_volatility)) => {
                    report.observations.push(RawObservation {
                        timestamp,
                        price,
                        volume,
                        open_interest,
                        implied_volatility,
                    });
                }
                None => {
                    warn!(origin, line, "skipping row with missing values");
                    report.skipped_rows += 1;
                }
            }
        }
        Ok(report)
    }

    fn parse_timestamp(&self, record: &StringRecord, columns: &ColumnMap) -> Option<NaiveDateTime> {
        let date = clean_date(record.get(columns.date)?);
        let time = record.get(columns.time)?.trim();
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), &self.config.datetime_format).ok()
    }
}

/// Strip spreadsheet formula quoting: `="05-01-24"` becomes `05-01-24`.
pub fn clean_date(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed);
    trimmed.trim_matches('"')
}

fn parse_values(record: &StringRecord, columns: &ColumnMap) -> Option<(f64, f64, f64, f64)> {
    let field = |idx: usize| -> Option<f64> {
        let value = record.get(idx)?.trim();
        if value.is_empty() {
            return None;
        }
        value.parse::<f64>().ok()
    };

    Some((
        field(columns.price)?,
        field(columns.volume)?,
        field(columns.open_interest)?,
        field(columns.implied_volatility)?,
    ))
}
