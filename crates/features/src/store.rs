//! Dataset persistence as CSV.
//!
//! Layout: `date, <feature columns in schema order>, label, label_numeric`.
//! Floats are written in their shortest round-trip form, so a reloaded
//! dataset reproduces every feature value bit for bit.

use chrono::NaiveDate;
use signal_core::{Error, FeatureSchema, Result, Signal};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::dataset::{Dataset, DatasetRow};

const DATE_COLUMN: &str = "date";
const LABEL_COLUMN: &str = "label";
const LABEL_NUMERIC_COLUMN: &str = "label_numeric";

/// Write a dataset with a header row.
pub fn write_dataset<W: Write>(writer: W, dataset: &Dataset) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(dataset.schema().len() + 3);
    header.push(DATE_COLUMN.to_string());
    header.extend(dataset.schema().columns().iter().cloned());
    header.push(LABEL_COLUMN.to_string());
    header.push(LABEL_NUMERIC_COLUMN.to_string());
    wtr.write_record(&header)?;

    for row in dataset.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.date.to_string());
        record.extend(row.features.iter().map(|v| v.to_string()));
        record.push(row.label.as_str().to_string());
        record.push(row.label.numeric().to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a dataset, reconstructing the schema from the header.
pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let names: Vec<&str> = headers.iter().collect();

    if names.len() < 4
        || names[0] != DATE_COLUMN
        || names[names.len() - 2] != LABEL_COLUMN
        || names[names.len() - 1] != LABEL_NUMERIC_COLUMN
    {
        return Err(Error::data(
            "dataset header must be: date, <features...>, label, label_numeric",
        ));
    }
    let feature_names: Vec<String> = names[1..names.len() - 2]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let width = feature_names.len();
    let schema = FeatureSchema::new(feature_names)?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let date = field(0)
            .parse::<NaiveDate>()
            .map_err(|e| Error::data(format!("line {line}: bad date: {e}")))?;

        let features = (1..=width)
            .map(|idx| {
                field(idx).parse::<f64>().map_err(|e| {
                    Error::data(format!("line {line}: bad value in column {idx}: {e}"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let label: Signal = field(width + 1).parse()?;
        let numeric = field(width + 2)
            .parse::<u8>()
            .ok()
            .and_then(Signal::from_numeric);
        if numeric != Some(label) {
            return Err(Error::data(format!(
                "line {line}: label '{}' disagrees with label_numeric '{}'",
                label,
                field(width + 2)
            )));
        }

        rows.push(DatasetRow {
            date,
            features,
            label,
        });
    }

    Dataset::new(schema, rows)
}

/// Save a dataset to a file.
pub fn save_dataset(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_dataset(file, dataset)?;
    info!(path = %path.display(), rows = dataset.len(), "saved dataset");
    Ok(())
}

/// Load a dataset from a file.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let dataset = read_dataset(file)?;
    info!(path = %path.display(), rows = dataset.len(), "loaded dataset");
    Ok(dataset)
}
