//! Core data types for the index-signal system.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A single intraday observation of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Combined date and time of the observation.
    pub timestamp: NaiveDateTime,
    /// Instrument (spot) price.
    pub price: f64,
    /// Traded volume.
    pub volume: f64,
    /// Open interest.
    pub open_interest: f64,
    /// Implied volatility.
    pub implied_volatility: f64,
}

impl RawObservation {
    /// Calendar date of the observation.
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Daily OHLCV bar with open interest and implied volatility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Calendar day (unique key).
    pub date: NaiveDate,
    /// First price of the day.
    pub open: f64,
    /// Highest price of the day.
    pub high: f64,
    /// Lowest price of the day.
    pub low: f64,
    /// Last price of the day.
    pub close: f64,
    /// Summed volume.
    pub volume: f64,
    /// Last open interest of the day.
    pub open_interest: f64,
    /// Mean implied volatility of the day.
    pub implied_volatility: f64,
}

impl DailyBar {
    /// Check the OHLC envelope: low <= min(open, close), high >= max(open, close).
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// Three-class directional signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Signal {
    /// Next-period return below the dead zone.
    Sell = 0,
    /// Next-period return inside the dead zone.
    Hold = 1,
    /// Next-period return above the dead zone.
    Buy = 2,
}

impl Signal {
    /// All classes in numeric order.
    pub const ALL: [Signal; 3] = [Signal::Sell, Signal::Hold, Signal::Buy];

    /// Numeric class encoding (0/1/2).
    #[inline]
    pub fn numeric(self) -> u8 {
        self as u8
    }

    /// Index into per-class arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode a numeric class.
    pub fn from_numeric(value: u8) -> Option<Self> {
        match value {
            0 => Some(Signal::Sell),
            1 => Some(Signal::Hold),
            2 => Some(Signal::Buy),
            _ => None,
        }
    }

    /// Upper-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::Buy => "BUY",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            "BUY" => Ok(Signal::Buy),
            other => Err(Error::data(format!("unknown signal label '{other}'"))),
        }
    }
}

/// Canonical ordered list of feature columns.
///
/// The order is the contract between training and serving: a model trained on
/// one schema must be fed vectors in exactly that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema from ordered column names.
    ///
    /// Column names must be non-empty and unique.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::data("feature schema has no columns"));
        }
        for (i, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::data(format!("feature column {i} has an empty name")));
            }
            if columns[..i].contains(name) {
                return Err(Error::data(format!("duplicate feature column '{name}'")));
            }
        }
        Ok(Self { columns })
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema is empty (never true for a constructed schema).
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// BLAKE3 fingerprint over the ordered names.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Describe the first difference against another ordered list, if any.
    pub fn diff(&self, other: &[String]) -> Option<String> {
        if self.columns.len() != other.len() {
            return Some(format!(
                "expected {} feature columns, found {}",
                self.columns.len(),
                other.len()
            ));
        }
        self.columns
            .iter()
            .zip(other)
            .enumerate()
            .find(|(_, (a, b))| a != b)
            .map(|(i, (a, b))| format!("column {i}: expected '{a}', found '{b}'"))
    }
}
