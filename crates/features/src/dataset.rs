//! Dataset assembly: join features and labels, drop incomplete rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use signal_core::{Config, DailyBar, Error, FeatureSchema, Result, Signal};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::engine::IndicatorEngine;
use crate::labeler::Labeler;

/// One complete training/serving row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Row date (the day you would act on).
    pub date: NaiveDate,
    /// Feature values in schema order.
    pub features: Vec<f64>,
    /// Class of the forward return.
    pub label: Signal,
}

/// Ordered rows sharing one feature schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: FeatureSchema,
    rows: Vec<DatasetRow>,
}

/// Date range and class counts of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// First row date.
    pub start: Option<NaiveDate>,
    /// Last row date.
    pub end: Option<NaiveDate>,
    /// Number of rows.
    pub total_days: usize,
    /// Row count per class.
    pub signal_distribution: BTreeMap<Signal, usize>,
}

impl Dataset {
    /// Create a dataset, checking vector widths and strict date order.
    pub fn new(schema: FeatureSchema, rows: Vec<DatasetRow>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.features.len() != schema.len() {
                return Err(Error::data(format!(
                    "row {} ({}) has {} features, schema has {}",
                    i,
                    row.date,
                    row.features.len(),
                    schema.len()
                )));
            }
            if i > 0 && row.date <= rows[i - 1].date {
                return Err(Error::data(format!(
                    "rows not strictly ascending: {} follows {}",
                    row.date,
                    rows[i - 1].date
                )));
            }
        }
        Ok(Self { schema, rows })
    }

    /// Canonical feature columns.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// All rows, ascending by date.
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for an exact date.
    pub fn get(&self, date: NaiveDate) -> Option<&DatasetRow> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Row dates in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.date)
    }

    /// A named feature of a row.
    pub fn value(&self, row: &DatasetRow, column: &str) -> Option<f64> {
        self.schema.position(column).map(|i| row.features[i])
    }

    /// Slice a row by an ordered column list (for example the list stored in a model artifact).
    pub fn select(&self, row: &DatasetRow, columns: &[String]) -> Result<Vec<f64>> {
        columns
            .iter()
            .map(|name| {
                self.value(row, name).ok_or_else(|| {
                    Error::artifact_mismatch(format!("dataset has no feature column '{name}'"))
                })
            })
            .collect()
    }

    /// Feature matrix and labels, row-aligned.
    pub fn to_xy(&self) -> (Vec<Vec<f64>>, Vec<Signal>) {
        self.rows
            .iter()
            .map(|r| (r.features.clone(), r.label))
            .unzip()
    }

    /// Date range and class distribution.
    pub fn summary(&self) -> DatasetSummary {
        let mut signal_distribution = BTreeMap::new();
        for row in &self.rows {
            *signal_distribution.entry(row.label).or_insert(0) += 1;
        }
        DatasetSummary {
            start: self.rows.first().map(|r| r.date),
            end: self.rows.last().map(|r| r.date),
            total_days: self.rows.len(),
            signal_distribution,
        }
    }
}

/// Row accounting for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Input bars.
    pub input_bars: usize,
    /// Rows dropped inside the indicator warm-up.
    pub warmup_dropped: usize,
    /// Rows dropped after warm-up for an undefined (non-finite) feature.
    pub undefined_dropped: usize,
    /// Trailing rows with no bar `horizon` days ahead.
    pub tail_dropped: usize,
    /// Rows with a bar ahead but no defined forward return (zero close).
    pub unlabeled_dropped: usize,
    /// Rows kept.
    pub rows: usize,
}

/// Builds datasets from daily bars.
pub struct DatasetAssembler {
    engine: IndicatorEngine,
    labeler: Labeler,
    min_rows: usize,
}

impl DatasetAssembler {
    /// Create an assembler from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let engine = IndicatorEngine::new(&config.features)?;
        let min_rows = config
            .dataset
            .min_rows
            .unwrap_or_else(|| config.features.longest_window());
        Ok(Self {
            engine,
            labeler: Labeler::new(&config.labeling),
            min_rows,
        })
    }

    /// Canonical feature columns.
    pub fn schema(&self) -> &FeatureSchema {
        self.engine.schema()
    }

    /// Expected row count for `n` bars when no feature is non-finite after warm-up.
    pub fn expected_rows(&self, n: usize) -> usize {
        n.saturating_sub(self.engine.warmup() + self.labeler.horizon())
    }

    /// Assemble a dataset.
    pub fn assemble(&self, bars: &[DailyBar]) -> Result<Dataset> {
        self.assemble_with_stats(bars).map(|(dataset, _)| dataset)
    }

    /// Assemble a dataset and report how many rows were dropped and why.
    pub fn assemble_with_stats(&self, bars: &[DailyBar]) -> Result<(Dataset, AssemblyStats)> {
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(Error::data(format!(
                "bars not strictly ascending: {} follows {}",
                w[1].date, w[0].date
            )));
        }

        let frame = self.engine.compute(bars);
        let labels = self.labeler.label(bars);
        let warmup = self.engine.warmup();
        let schema = self.engine.schema();

        let mut stats = AssemblyStats {
            input_bars: bars.len(),
            ..AssemblyStats::default()
        };
        let mut rows = Vec::with_capacity(self.expected_rows(bars.len()));

        for (i, label) in labels.iter().enumerate() {
            let Some(label) = label else {
                if i + self.labeler.horizon() >= bars.len() {
                    stats.tail_dropped += 1;
                } else {
                    debug!(date = %bars[i].date, "dropping row with undefined forward return");
                    stats.unlabeled_dropped += 1;
                }
                continue;
            };
            match frame.vector(i, schema) {
                Ok(features) => rows.push(DatasetRow {
                    date: bars[i].date,
                    features,
                    label: label.signal,
                }),
                Err(Error::UndefinedFeature { date, column }) => {
                    if i < warmup {
                        stats.warmup_dropped += 1;
                    } else {
                        debug!(%date, column = %column, "dropping row with undefined feature");
                        stats.undefined_dropped += 1;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        stats.rows = rows.len();

        info!(
            input_bars = stats.input_bars,
            rows = stats.rows,
            warmup_dropped = stats.warmup_dropped,
            undefined_dropped = stats.undefined_dropped,
            tail_dropped = stats.tail_dropped,
            unlabeled_dropped = stats.unlabeled_dropped,
            "assembled dataset"
        );

        if rows.len() < self.min_rows {
            return Err(Error::EmptyDataset {
                rows: rows.len(),
                min_rows: self.min_rows,
            });
        }

        Ok((Dataset::new(schema.clone(), rows)?, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_bars, wave};

    #[test]
    fn test_row_count_is_deterministic() {
        let config = Config::default();
        let assembler = DatasetAssembler::new(&config).unwrap();
        let bars = make_bars(&wave(120));

        let (dataset, stats) = assembler.assemble_with_stats(&bars).unwrap();

        // N - warmup (49) - horizon (1)
        assert_eq!(dataset.len(), 70);
        assert_eq!(assembler.expected_rows(120), 70);
        assert_eq!(stats.warmup_dropped, 49);
        assert_eq!(stats.tail_dropped, 1);
        assert_eq!(stats.unlabeled_dropped, 0);
        assert_eq!(stats.undefined_dropped, 0);
        assert_eq!(dataset.rows()[0].date, bars[49].date);
        assert_eq!(dataset.rows().last().unwrap().date, bars[118].date);
    }

    #[test]
    fn test_too_few_rows() {
        let assembler = DatasetAssembler::new(&Config::default()).unwrap();
        let bars = make_bars(&wave(80));

        match assembler.assemble(&bars) {
            Err(Error::EmptyDataset { rows, min_rows }) => {
                assert_eq!(rows, 30);
                assert_eq!(min_rows, 50);
            }
            other => panic!("expected EmptyDataset, got {other:?}"),
        }
    }

    #[test]
    fn test_min_rows_override() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(10);
        let assembler = DatasetAssembler::new(&config).unwrap();

        let dataset = assembler.assemble(&make_bars(&wave(80))).unwrap();
        assert_eq!(dataset.len(), 30);
    }

    #[test]
    fn test_labels_match_next_close() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(1);
        let assembler = DatasetAssembler::new(&config).unwrap();
        let bars = make_bars(&wave(70));
        let dataset = assembler.assemble(&bars).unwrap();
        let labeler = Labeler::default();

        for row in dataset.rows() {
            let i = bars.iter().position(|b| b.date == row.date).unwrap();
            let r = (bars[i + 1].close - bars[i].close) / bars[i].close * 100.0;
            assert_eq!(Some(row.label), labeler.classify(r));
        }
    }

    #[test]
    fn test_unsorted_bars_rejected() {
        let assembler = DatasetAssembler::new(&Config::default()).unwrap();
        let mut bars = make_bars(&wave(60));
        bars.swap(10, 11);
        assert!(matches!(assembler.assemble(&bars), Err(Error::Data(_))));
    }

    #[test]
    fn test_non_finite_feature_drops_row() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(1);
        let assembler = DatasetAssembler::new(&config).unwrap();
        let mut bars = make_bars(&wave(70));
        bars[60].implied_volatility = f64::NAN;

        let (dataset, stats) = assembler.assemble_with_stats(&bars).unwrap();
        assert_eq!(stats.undefined_dropped, 1);
        assert_eq!(dataset.len(), assembler.expected_rows(70) - 1);
        assert!(dataset.get(bars[60].date).is_none());
    }

    #[test]
    fn test_zero_close_is_unlabeled_not_tail() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(1);
        let assembler = DatasetAssembler::new(&config).unwrap();
        let mut bars = make_bars(&wave(70));
        bars[60].close = 0.0;

        let (dataset, stats) = assembler.assemble_with_stats(&bars).unwrap();
        assert_eq!(stats.unlabeled_dropped, 1);
        assert_eq!(stats.tail_dropped, 1);
        assert!(dataset.get(bars[60].date).is_none());
    }

    #[test]
    fn test_lookup_and_select() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(1);
        let assembler = DatasetAssembler::new(&config).unwrap();
        let bars = make_bars(&wave(70));
        let dataset = assembler.assemble(&bars).unwrap();

        let row = dataset.get(bars[55].date).unwrap();
        let all = dataset.select(row, dataset.schema().columns()).unwrap();
        assert_eq!(all, row.features);

        let picked = dataset
            .select(row, &["close".to_string(), "open".to_string()])
            .unwrap();
        assert_eq!(picked, vec![bars[55].close, bars[55].open]);

        assert!(dataset.select(row, &["missing".to_string()]).is_err());
        assert!(dataset.get(bars[10].date).is_none());
    }

    #[test]
    fn test_summary() {
        let mut config = Config::default();
        config.dataset.min_rows = Some(1);
        let assembler = DatasetAssembler::new(&config).unwrap();
        let dataset = assembler.assemble(&make_bars(&wave(70))).unwrap();
        let summary = dataset.summary();

        assert_eq!(summary.total_days, 20);
        assert_eq!(summary.signal_distribution.values().sum::<usize>(), 20);
        assert_eq!(summary.start, dataset.rows().first().map(|r| r.date));
    }

    #[test]
    fn test_dataset_rejects_duplicate_dates() {
        let schema = FeatureSchema::new(vec!["close".to_string()]).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let row = DatasetRow {
            date,
            features: vec![1.0],
            label: Signal::Hold,
        };
        assert!(Dataset::new(schema, vec![row.clone(), row]).is_err());
    }
}
