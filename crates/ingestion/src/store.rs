//! Daily bar persistence as CSV.

use signal_core::{DailyBar, Error, Result};
use std::io::{Read, Write};
use std::path::Path;

/// Write bars with a header row.
pub fn write_bars<W: Write>(writer: W, bars: &[DailyBar]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read bars and check they are strictly ascending by date.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<DailyBar>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars: Vec<DailyBar> = Vec::new();
    for record in rdr.deserialize() {
        let bar: DailyBar = record?;
        if let Some(prev) = bars.last() {
            if bar.date <= prev.date {
                return Err(Error::data(format!(
                    "bars out of order: {} follows {}",
                    bar.date, prev.date
                )));
            }
        }
        bars.push(bar);
    }
    Ok(bars)
}

/// Save bars to a file.
pub fn save_bars(path: impl AsRef<Path>, bars: &[DailyBar]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_bars(file, bars)
}

/// Load bars from a file.
pub fn load_bars(path: impl AsRef<Path>) -> Result<Vec<DailyBar>> {
    let file = std::fs::File::open(path)?;
    read_bars(file)
}
