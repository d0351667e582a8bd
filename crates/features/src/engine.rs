//! Indicator computation engine.
//!
//! Turns an ordered bar sequence into named feature columns. Every value at
//! index `t` is computed from bars `0..=t` only.

use chrono::NaiveDate;
use signal_core::config::FeatureConfig;
use signal_core::{DailyBar, Error, FeatureSchema, Result};
use std::collections::HashMap;

use crate::lags::{lag, pct_change, ratio};
use crate::moving_average::{ema, sma};
use crate::oscillators::{roc, rsi, Macd};
use crate::volatility::Bollinger;
use crate::{finite, Series};

/// Auxiliary columns computed alongside the schema but not fed to the model.
pub const AUX_PRICE_CHANGE: &str = "price_change";
/// Bollinger standard deviation.
pub const AUX_BB_STD: &str = "bb_std";

/// A named feature column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Values per bar; `None` where undefined.
    pub values: Series,
}

/// Indicator output for a bar sequence.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl FeatureFrame {
    fn new(dates: Vec<NaiveDate>, columns: Vec<Column>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            dates,
            columns,
            index,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Row dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// All columns in computation order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.index
            .get(name)
            .map(|&i| self.columns[i].values.as_slice())
    }

    /// Single value by row and column name.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)?.get(row).copied().flatten()
    }

    /// Feature vector for a row, in schema order.
    ///
    /// Fails with `UndefinedFeature` naming the first undefined column.
    pub fn vector(&self, row: usize, schema: &FeatureSchema) -> Result<Vec<f64>> {
        let date = *self
            .dates
            .get(row)
            .ok_or_else(|| Error::data(format!("row {row} out of range")))?;

        schema
            .columns()
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| Error::data(format!("frame has no column '{name}'")))?[row]
                    .ok_or_else(|| Error::undefined_feature(date, name.as_str()))
            })
            .collect()
    }
}

/// Feature computation engine.
pub struct IndicatorEngine {
    config: FeatureConfig,
    schema: FeatureSchema,
}

impl IndicatorEngine {
    /// Create a new engine from configuration.
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        Ok(Self {
            schema: config.schema()?,
            config: config.clone(),
        })
    }

    /// Canonical feature columns this engine produces.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Number of leading rows with at least one undefined feature.
    pub fn warmup(&self) -> usize {
        self.config.warmup()
    }

    /// Compute all feature columns over an ordered bar sequence.
    pub fn compute(&self, bars: &[DailyBar]) -> FeatureFrame {
        let cfg = &self.config;
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let open: Vec<f64> = bars.iter().map(|b| b.open).collect();
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let open_interest: Vec<f64> = bars.iter().map(|b| b.open_interest).collect();
        let iv: Vec<f64> = bars.iter().map(|b| b.implied_volatility).collect();

        let mut columns = Vec::with_capacity(self.schema.len() + 3);
        let mut push = |name: String, values: Series| columns.push(Column { name, values });

        // Raw bar fields
        push("open".into(), raw(&open));
        push("high".into(), raw(&high));
        push("low".into(), raw(&low));
        push("close".into(), raw(&close));
        push("volume".into(), raw(&volume));
        push("open_interest".into(), raw(&open_interest));
        push("implied_volatility".into(), raw(&iv));

        // Trend
        for &w in &cfg.sma_windows {
            push(format!("sma_{w}"), sma(&close, w));
        }
        let ema_fast = ema(&close, cfg.ema_fast);
        let ema_slow = ema(&close, cfg.ema_slow);
        let macd = Macd::from_emas(&ema_fast, &ema_slow, cfg.macd_signal);
        push(format!("ema_{}", cfg.ema_fast), raw(&ema_fast));
        push(format!("ema_{}", cfg.ema_slow), raw(&ema_slow));
        push("macd".into(), raw(&macd.line));
        push("macd_signal".into(), raw(&macd.signal));
        push("macd_diff".into(), raw(&macd.histogram));

        // Momentum and volatility
        push(format!("rsi_{}", cfg.rsi_period), rsi(&close, cfg.rsi_period));
        let bb = Bollinger::compute(
            &close,
            cfg.bollinger_window,
            cfg.bollinger_k,
            cfg.bollinger_std,
        );
        push("bb_middle".into(), bb.middle);
        push("bb_upper".into(), bb.upper);
        push("bb_lower".into(), bb.lower);
        push("bb_width".into(), bb.width);
        push(AUX_BB_STD.into(), bb.std);
        push(format!("roc_{}", cfg.roc_period), roc(&close, cfg.roc_period));

        // Volume
        let volume_sma = sma(&volume, cfg.volume_window);
        push("volume_ratio".into(), ratio(&volume, &volume_sma));
        push(format!("volume_sma_{}", cfg.volume_window), volume_sma);

        // Same-day price action
        push(
            AUX_PRICE_CHANGE.into(),
            close.iter().zip(&open).map(|(c, o)| finite(c - o)).collect(),
        );
        push(
            "price_change_pct".into(),
            close
                .iter()
                .zip(&open)
                .map(|(c, o)| if *o == 0.0 { None } else { finite((c - o) / o * 100.0) })
                .collect(),
        );
        push(
            "high_low_diff".into(),
            high.iter().zip(&low).map(|(h, l)| finite(h - l)).collect(),
        );
        push("daily_return".into(), pct_change(&close));

        // Lags
        for &k in &cfg.lags {
            push(format!("close_lag_{k}"), lag(&close, k));
            push(format!("volume_lag_{k}"), lag(&volume, k));
        }

        FeatureFrame::new(dates, columns)
    }
}

fn raw(values: &[f64]) -> Series {
    values.iter().map(|&v| finite(v)).collect()
}
