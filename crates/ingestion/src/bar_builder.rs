//! Daily bar building from intraday observations.
//!
//! Groups observations by calendar date and reduces each group to one
//! OHLCV bar with open interest and implied volatility.

use chrono::{NaiveDate, NaiveDateTime};
use signal_core::{DailyBar, Error, RawObservation, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Builder for daily bars from raw observations.
///
/// Observations may arrive in any order; open/close and the last open
/// interest are resolved by timestamp, with ties broken by arrival order.
pub struct DailyBarBuilder {
    /// Bars being built, keyed by calendar date.
    bars: BTreeMap<NaiveDate, BarInProgress>,
    /// Observations rejected for a non-finite price.
    rejected: usize,
}

/// A bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    date: NaiveDate,
    first_ts: Option<NaiveDateTime>,
    last_ts: Option<NaiveDateTime>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    oi_ts: Option<NaiveDateTime>,
    open_interest: f64,
    iv_sum: f64,
    iv_count: u32,
    count: u32,
}

impl BarInProgress {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            first_ts: None,
            last_ts: None,
            open: 0.0,
            high: f64::NEG_INFINITY,
            low: f64::INFINITY,
            close: 0.0,
            volume: 0.0,
            oi_ts: None,
            open_interest: f64::NAN,
            iv_sum: 0.0,
            iv_count: 0,
            count: 0,
        }
    }

    fn add(&mut self, obs: &RawObservation) {
        // Strictly earlier replaces the open; equal-or-later replaces the close.
        if self.first_ts.map_or(true, |ts| obs.timestamp < ts) {
            self.first_ts = Some(obs.timestamp);
            self.open = obs.price;
        }
        if self.last_ts.map_or(true, |ts| obs.timestamp >= ts) {
            self.last_ts = Some(obs.timestamp);
            self.close = obs.price;
        }
        self.high = self.high.max(obs.price);
        self.low = self.low.min(obs.price);
        self.count += 1;

        // Secondary fields skip their own non-finite values.
        if obs.volume.is_finite() {
            self.volume += obs.volume;
        }
        if obs.open_interest.is_finite() && self.oi_ts.map_or(true, |ts| obs.timestamp >= ts) {
            self.oi_ts = Some(obs.timestamp);
            self.open_interest = obs.open_interest;
        }
        if obs.implied_volatility.is_finite() {
            self.iv_sum += obs.implied_volatility;
            self.iv_count += 1;
        }
    }

    fn to_bar(&self) -> Option<DailyBar> {
        if self.count == 0 {
            return None;
        }

        Some(DailyBar {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            open_interest: self.open_interest,
            implied_volatility: if self.iv_count == 0 {
                f64::NAN
            } else {
                self.iv_sum / self.iv_count as f64
            },
        })
    }
}

impl DailyBarBuilder {
    /// Create a new bar builder.
    pub fn new() -> Self {
        Self {
            bars: BTreeMap::new(),
            rejected: 0,
        }
    }

    /// Add an observation.
    ///
    /// An observation with a non-finite price still opens its date group
    /// but contributes nothing to it. Non-finite volume, open interest or
    /// implied volatility only drop that field.
    pub fn add_observation(&mut self, obs: &RawObservation) {
        let date = obs.date();
        let bar = self
            .bars
            .entry(date)
            .or_insert_with(|| BarInProgress::new(date));

        if obs.price.is_finite() {
            bar.add(obs);
        } else {
            debug!(%date, timestamp = %obs.timestamp, "rejecting non-finite price");
            self.rejected += 1;
        }
    }

    /// Add multiple observations.
    pub fn add_observations(&mut self, observations: &[RawObservation]) {
        for obs in observations {
            self.add_observation(obs);
        }
    }

    /// Get the number of date groups currently being built.
    pub fn pending_bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Get the number of rejected observations.
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    /// Finalize all groups into bars sorted ascending by date.
    ///
    /// Fails with `IncompleteGroup` if any date group has no valid observation.
    pub fn finish(self) -> Result<Vec<DailyBar>> {
        let mut bars = Vec::with_capacity(self.bars.len());
        for (date, in_progress) in &self.bars {
            let bar = in_progress.to_bar().ok_or(Error::IncompleteGroup(*date))?;
            bars.push(bar);
        }

        info!(
            bars = bars.len(),
            rejected = self.rejected,
            "aggregated daily bars"
        );
        Ok(bars)
    }
}

impl Default for DailyBarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate observations into daily bars in one call.
pub fn aggregate_daily(observations: &[RawObservation]) -> Result<Vec<DailyBar>> {
    let mut builder = DailyBarBuilder::new();
    builder.add_observations(observations);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn make_obs(timestamp: NaiveDateTime, price: f64, volume: f64) -> RawObservation {
        RawObservation {
            timestamp,
            price,
            volume,
            open_interest: volume * 10.0,
            implied_volatility: price / 1000.0,
        }
    }

    #[test]
    fn test_single_day() {
        let observations = vec![
            make_obs(ts(2, 9, 15), 21000.0, 10.0), // Open
            make_obs(ts(2, 10, 0), 21050.0, 20.0), // High
            make_obs(ts(2, 11, 0), 20950.0, 5.0),  // Low
            make_obs(ts(2, 15, 29), 21010.0, 15.0), // Close
        ];

        let bars = aggregate_daily(&observations).unwrap();

        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_relative_eq!(bar.open, 21000.0);
        assert_relative_eq!(bar.high, 21050.0);
        assert_relative_eq!(bar.low, 20950.0);
        assert_relative_eq!(bar.close, 21010.0);
        assert_relative_eq!(bar.volume, 50.0);
        assert_relative_eq!(bar.open_interest, 150.0);
        assert_relative_eq!(bar.implied_volatility, (21.0 + 21.05 + 20.95 + 21.01) / 4.0);
        assert!(bar.is_consistent());
    }

    #[test]
    fn test_unordered_input() {
        let observations = vec![
            make_obs(ts(3, 15, 0), 102.0, 1.0),
            make_obs(ts(2, 12, 0), 100.0, 1.0),
            make_obs(ts(3, 9, 15), 101.0, 1.0),
            make_obs(ts(2, 9, 15), 99.0, 1.0),
        ];

        let bars = aggregate_daily(&observations).unwrap();

        assert_eq!(bars.len(), 2);
        assert!(bars[0].date < bars[1].date);
        assert_relative_eq!(bars[0].open, 99.0);
        assert_relative_eq!(bars[0].close, 100.0);
        assert_relative_eq!(bars[1].open, 101.0);
        assert_relative_eq!(bars[1].close, 102.0);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let observations = vec![
            make_obs(ts(2, 9, 15), 100.0, 1.0),
            make_obs(ts(2, 9, 15), 101.0, 1.0),
        ];

        let bars = aggregate_daily(&observations).unwrap();

        assert_relative_eq!(bars[0].open, 100.0);
        assert_relative_eq!(bars[0].close, 101.0);
    }

    #[test]
    fn test_calendar_gaps_allowed() {
        let observations = vec![
            make_obs(ts(5, 10, 0), 100.0, 1.0),
            make_obs(ts(8, 10, 0), 101.0, 1.0),
        ];

        let bars = aggregate_daily(&observations).unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn test_incomplete_group() {
        let mut builder = DailyBarBuilder::new();
        builder.add_observation(&make_obs(ts(2, 10, 0), 100.0, 1.0));
        builder.add_observation(&make_obs(ts(3, 10, 0), f64::NAN, 1.0));

        assert_eq!(builder.pending_bar_count(), 2);
        assert_eq!(builder.rejected_count(), 1);

        match builder.finish() {
            Err(Error::IncompleteGroup(date)) => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
            }
            other => panic!("expected IncompleteGroup, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_observation_does_not_move_bar() {
        let observations = vec![
            make_obs(ts(2, 9, 15), 100.0, 1.0),
            make_obs(ts(2, 15, 0), f64::INFINITY, 1.0),
        ];

        let bars = aggregate_daily(&observations).unwrap();
        assert_relative_eq!(bars[0].close, 100.0);
        assert_relative_eq!(bars[0].high, 100.0);
    }

    #[test]
    fn test_non_finite_secondary_fields_keep_price() {
        let mut late = make_obs(ts(2, 15, 0), 105.0, 2.0);
        late.implied_volatility = f64::NAN;
        late.open_interest = f64::NAN;
        let observations = vec![make_obs(ts(2, 9, 0), 100.0, 1.0), late];

        let bars = aggregate_daily(&observations).unwrap();
        let bar = &bars[0];
        assert_relative_eq!(bar.close, 105.0);
        assert_relative_eq!(bar.high, 105.0);
        assert_relative_eq!(bar.volume, 3.0);
        // last finite open interest and mean over finite IV only
        assert_relative_eq!(bar.open_interest, 10.0);
        assert_relative_eq!(bar.implied_volatility, 0.1);
    }

    #[test]
    fn test_only_iv_missing_still_builds_bar() {
        let mut obs = make_obs(ts(2, 10, 0), 100.0, 1.0);
        obs.implied_volatility = f64::NAN;
        obs.volume = f64::INFINITY;

        let mut builder = DailyBarBuilder::new();
        builder.add_observation(&obs);
        assert_eq!(builder.rejected_count(), 0);

        let bars = builder.finish().unwrap();
        assert_relative_eq!(bars[0].close, 100.0);
        assert_relative_eq!(bars[0].volume, 0.0);
        assert!(bars[0].implied_volatility.is_nan());
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_daily(&[]).unwrap().is_empty());
    }
}
