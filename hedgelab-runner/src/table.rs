//! Labelled feature table: bar series plus indicator columns and targets.
//!
//! Rows are bars in strictly increasing timestamp order. Every column other
//! than `timestamp` and `target` is a model feature, including the OHLC and
//! ATR columns the simulator also reads from [`Bar`].

use std::collections::HashSet;
use std::ops::Range;

use hedgelab_core::domain::{Bar, Direction};
use thiserror::Error;

/// Feature columns every table carries, in this order.
pub const BAR_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "atr"];

/// Structural problems with a feature table.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column length mismatch: {bars} bars, {rows} feature rows, {targets} targets")]
    LengthMismatch {
        bars: usize,
        rows: usize,
        targets: usize,
    },

    #[error("feature row {row} has {width} values, expected {expected}")]
    RowWidth {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("duplicate feature column '{0}'")]
    DuplicateColumn(String),

    #[error("bar at row {row} has a missing price or inconsistent high/low")]
    MalformedBar { row: usize },

    #[error("timestamps not strictly increasing at row {row}")]
    UnorderedTimestamps { row: usize },

    #[error("row range {start}..{end} out of bounds for {len} rows")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Bar-indexed table of features and target labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    bars: Vec<Bar>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    targets: Vec<Direction>,
}

impl FeatureTable {
    /// Build a table from its columns, validating shape and ordering.
    pub fn new(
        bars: Vec<Bar>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<Direction>,
    ) -> Result<Self, TableError> {
        let table = Self {
            bars,
            feature_names,
            features,
            targets,
        };
        table.validate()?;
        Ok(table)
    }

    /// Table whose only features are the bar columns themselves.
    pub fn from_bars(bars: Vec<Bar>, targets: Vec<Direction>) -> Result<Self, TableError> {
        let features = bars.iter().map(bar_features).collect();
        let names = BAR_COLUMNS.iter().map(|c| c.to_string()).collect();
        Self::new(bars, names, features, targets)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        let (bars, rows, targets) = (self.bars.len(), self.features.len(), self.targets.len());
        if bars != rows || bars != targets {
            return Err(TableError::LengthMismatch {
                bars,
                rows,
                targets,
            });
        }

        let mut seen = HashSet::new();
        for name in &self.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }

        let expected = self.feature_names.len();
        for (row, values) in self.features.iter().enumerate() {
            if values.len() != expected {
                return Err(TableError::RowWidth {
                    row,
                    width: values.len(),
                    expected,
                });
            }
        }

        if let Some(row) = self.bars.iter().position(|bar| !bar.is_sane()) {
            return Err(TableError::MalformedBar { row });
        }

        for (row, pair) in self.bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(TableError::UnorderedTimestamps { row: row + 1 });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature matrix, one row per bar.
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn targets(&self) -> &[Direction] {
        &self.targets
    }

    /// Copy of the rows in `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<FeatureTable, TableError> {
        if range.start > range.end || range.end > self.len() {
            return Err(TableError::OutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        Ok(FeatureTable {
            bars: self.bars[range.clone()].to_vec(),
            feature_names: self.feature_names.clone(),
            features: self.features[range.clone()].to_vec(),
            targets: self.targets[range].to_vec(),
        })
    }

    /// Same rows with the targets replaced.
    pub fn with_targets(&self, targets: Vec<Direction>) -> Result<FeatureTable, TableError> {
        FeatureTable::new(
            self.bars.clone(),
            self.feature_names.clone(),
            self.features.clone(),
            targets,
        )
    }

    /// Deterministic BLAKE3 hash over column names, timestamps, features and targets.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for ((bar, row), target) in self.bars.iter().zip(&self.features).zip(&self.targets) {
            hasher.update(bar.timestamp.to_string().as_bytes());
            for value in row {
                hasher.update(&value.to_le_bytes());
            }
            hasher.update(&target.label().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn bar_features(bar: &Bar) -> Vec<f64> {
    vec![bar.open, bar.high, bar.low, bar.close, bar.atr]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| Bar {
                timestamp: base + chrono::Duration::hours(i as i64),
                open: 10.0 + i as f64,
                high: 11.0 + i as f64,
                low: 9.0 + i as f64,
                close: 10.5 + i as f64,
                atr: 1.0,
            })
            .collect()
    }

    #[test]
    fn from_bars_uses_bar_columns() {
        let table = FeatureTable::from_bars(bars(3), vec![Direction::Flat; 3]).unwrap();
        assert_eq!(table.feature_names(), &["open", "high", "low", "close", "atr"]);
        assert_eq!(table.features()[1], vec![11.0, 12.0, 10.0, 11.5, 1.0]);
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = FeatureTable::from_bars(bars(3), vec![Direction::Flat; 2]).unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch {
                bars: 3,
                rows: 3,
                targets: 2
            }
        );
    }

    #[test]
    fn unordered_timestamps_rejected() {
        let mut b = bars(3);
        b[2].timestamp = b[1].timestamp;
        let err = FeatureTable::from_bars(b, vec![Direction::Flat; 3]).unwrap_err();
        assert_eq!(err, TableError::UnorderedTimestamps { row: 2 });
    }

    #[test]
    fn malformed_bars_rejected() {
        let mut b = bars(4);
        b[2].close = f64::NAN;
        let err = FeatureTable::from_bars(b, vec![Direction::Flat; 4]).unwrap_err();
        assert_eq!(err, TableError::MalformedBar { row: 2 });

        let mut b = bars(4);
        b[1].high = b[1].low - 0.5;
        let err = FeatureTable::from_bars(b, vec![Direction::Flat; 4]).unwrap_err();
        assert_eq!(err, TableError::MalformedBar { row: 1 });
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = FeatureTable::new(
            bars(2),
            vec!["x".into(), "y".into()],
            vec![vec![1.0, 2.0], vec![3.0]],
            vec![Direction::Long; 2],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::RowWidth { row: 1, .. }));
    }

    #[test]
    fn duplicate_columns_rejected() {
        let err = FeatureTable::new(
            bars(1),
            vec!["x".into(), "x".into()],
            vec![vec![1.0, 2.0]],
            vec![Direction::Long],
        )
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("x".into()));
    }

    #[test]
    fn slice_copies_rows() {
        let targets = vec![Direction::Short, Direction::Flat, Direction::Long, Direction::Flat];
        let table = FeatureTable::from_bars(bars(4), targets).unwrap();
        let part = table.slice(1..3).unwrap();
        assert_eq!(part.len(), 2);
        assert_eq!(part.bars()[0], table.bars()[1]);
        assert_eq!(part.targets(), &[Direction::Flat, Direction::Long]);
        assert!(table.slice(3..5).is_err());
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let a = FeatureTable::from_bars(bars(5), vec![Direction::Flat; 5]).unwrap();
        let b = FeatureTable::from_bars(bars(5), vec![Direction::Flat; 5]).unwrap();
        let c = a.with_targets(vec![Direction::Long; 5]).unwrap();
        assert_eq!(a.dataset_hash(), b.dataset_hash());
        assert_ne!(a.dataset_hash(), c.dataset_hash());
    }
}
