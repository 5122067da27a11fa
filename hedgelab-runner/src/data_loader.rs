//! Feature-table loading from CSV/Parquet and seeded synthetic data.
//!
//! Input frames carry `timestamp, open, high, low, close` and optionally
//! `atr`, a `target` column and any number of indicator columns. Every column
//! other than the timestamp and target becomes a feature, in frame order.
//! Missing pieces are filled in:
//! - no `atr` column: Wilder ATR over the true range
//! - no `target` column: TP/SL horizon labels from [`LabelSpec`]
//!
//! Synthetic tables are for offline runs and tests only.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hedgelab_core::domain::{Bar, Direction};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::labels::LabelSpec;
use crate::table::{FeatureTable, TableError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file type: {0} (expected .csv or .parquet)")]
    UnsupportedFormat(PathBuf),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("timestamp column has unsupported type {0}")]
    UnsupportedTimestamp(String),

    #[error("unparseable timestamp at row {row}: {value}")]
    BadTimestamp { row: usize, value: String },

    #[error("invalid target at row {row}: {value} (expected -1, 0 or 1)")]
    BadTarget { row: usize, value: String },

    #[error("invalid table: {0}")]
    Table(#[from] TableError),
}

/// Options controlling how a frame becomes a feature table.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub timestamp_column: String,
    pub target_column: String,
    /// Used when the frame has no target column.
    pub labels: LabelSpec,
    /// Window for the ATR computed when the frame has no `atr` column.
    pub atr_window: usize,
    /// Append the basic price features of [`price_features`].
    pub price_features: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timestamp_column: "timestamp".to_string(),
            target_column: "target".to_string(),
            labels: LabelSpec::default(),
            atr_window: 14,
            price_features: false,
        }
    }
}

/// Load a feature table from a `.csv` or `.parquet` file.
pub fn load_table(path: &Path, opts: &LoadOptions) -> Result<FeatureTable, LoadError> {
    let df = read_frame(path)?;
    let table = frame_to_table(&df, opts)?;
    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        features = table.feature_names().len(),
        "loaded feature table"
    );
    Ok(table)
}

fn read_frame(path: &Path) -> Result<DataFrame, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => Ok(LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()?
            .collect()?),
        Some("parquet") | Some("pq") => {
            let file = fs::File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(ParquetReader::new(file).finish()?)
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Convert an in-memory frame into a validated feature table.
pub fn frame_to_table(df: &DataFrame, opts: &LoadOptions) -> Result<FeatureTable, LoadError> {
    let timestamps = timestamp_column(df, &opts.timestamp_column)?;
    let open = required_f64(df, "open")?;
    let high = required_f64(df, "high")?;
    let low = required_f64(df, "low")?;
    let close = required_f64(df, "close")?;

    let mut names: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for name in df.get_column_names() {
        let name = name.as_str();
        if name == opts.timestamp_column || name == opts.target_column {
            continue;
        }
        names.push(name.to_string());
        columns.push(required_f64(df, name)?);
    }

    let atr = match names.iter().position(|n| n == "atr") {
        Some(idx) => columns[idx].clone(),
        None => {
            tracing::debug!(window = opts.atr_window, "no atr column, computing Wilder ATR");
            let atr = wilder_atr(&high, &low, &close, opts.atr_window);
            names.push("atr".to_string());
            columns.push(atr.clone());
            atr
        }
    };

    let bars: Vec<Bar> = (0..df.height())
        .map(|i| Bar {
            timestamp: timestamps[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            atr: atr[i],
        })
        .collect();

    if opts.price_features {
        for (name, values) in price_features(&bars) {
            names.push(name);
            columns.push(values);
        }
    }

    let targets = match df.column(&opts.target_column) {
        Ok(col) => target_column(col)?,
        Err(_) => opts.labels.apply(&bars),
    };

    let rows = to_rows(&columns, bars.len());
    Ok(FeatureTable::new(bars, names, rows, targets)?)
}

fn required_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, LoadError> {
    let col = df
        .column(name)
        .map_err(|_| LoadError::MissingColumn(name.to_string()))?;
    let cast = col.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn timestamp_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDateTime>, LoadError> {
    let col = df
        .column(name)
        .map_err(|_| LoadError::MissingColumn(name.to_string()))?;

    match col.dtype() {
        DataType::String => {
            let ca = col.str()?;
            ca.into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let raw = v.unwrap_or("");
                    parse_timestamp(raw).ok_or_else(|| LoadError::BadTimestamp {
                        row,
                        value: raw.to_string(),
                    })
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            integer_timestamps(col, |v| from_epoch(v, per_second))
        }
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| LoadError::UnsupportedTimestamp("date".into()))?;
            integer_timestamps(col, |v| Some(epoch + chrono::Duration::days(v)))
        }
        dtype if dtype.is_integer() => integer_timestamps(col, |v| from_epoch(v, 1)),
        other => Err(LoadError::UnsupportedTimestamp(other.to_string())),
    }
}

fn integer_timestamps(
    col: &Column,
    convert: impl Fn(i64) -> Option<NaiveDateTime>,
) -> Result<Vec<NaiveDateTime>, LoadError> {
    let ints = col.cast(&DataType::Int64)?;
    let ca = ints.i64()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.and_then(&convert).ok_or_else(|| LoadError::BadTimestamp {
                row,
                value: format!("{v:?}"),
            })
        })
        .collect()
}

fn from_epoch(value: i64, per_second: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.naive_utc())
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M",
];

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn target_column(col: &Column) -> Result<Vec<Direction>, LoadError> {
    let ints = col.cast(&DataType::Int64)?;
    let ca = ints.i64()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.and_then(|x| i8::try_from(x).ok())
                .and_then(Direction::from_label)
                .ok_or_else(|| LoadError::BadTarget {
                    row,
                    value: format!("{v:?}"),
                })
        })
        .collect()
}

fn to_rows(columns: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| columns.iter().map(|c| c[i]).collect())
        .collect()
}

// ── Derived columns ──────────────────────────────────────────────────

/// Wilder-smoothed average true range (`alpha = 1 / window`), seeded with the
/// first bar's high-low range.
pub fn wilder_atr(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<f64> {
    let alpha = 1.0 / window.max(1) as f64;
    let mut out = Vec::with_capacity(high.len());
    let mut prev_atr: Option<f64> = None;
    for i in 0..high.len() {
        let range = high[i] - low[i];
        let tr = if i == 0 {
            range
        } else {
            range
                .max((high[i] - close[i - 1]).abs())
                .max((low[i] - close[i - 1]).abs())
        };
        let atr = match prev_atr {
            Some(prev) => alpha * tr + (1.0 - alpha) * prev,
            None => tr,
        };
        prev_atr = Some(atr);
        out.push(atr);
    }
    out
}

/// Simple price-derived features. Leading rows without enough history are NaN.
pub fn price_features(bars: &[Bar]) -> Vec<(String, Vec<f64>)> {
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let pct_change = |lag: usize| -> Vec<f64> {
        (0..close.len())
            .map(|i| {
                if i < lag || close[i - lag] == 0.0 {
                    f64::NAN
                } else {
                    close[i] / close[i - lag] - 1.0
                }
            })
            .collect()
    };

    vec![
        ("return_1".to_string(), pct_change(1)),
        ("return_5".to_string(), pct_change(5)),
        ("return_12".to_string(), pct_change(12)),
        (
            "high_low_range".to_string(),
            bars.iter().map(|b| b.high - b.low).collect(),
        ),
        (
            "close_open".to_string(),
            bars.iter().map(|b| b.close - b.open).collect(),
        ),
    ]
}

// ── Synthetic data ───────────────────────────────────────────────────

/// Parameters of the synthetic random-walk generator.
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub rows: usize,
    pub seed: u64,
    pub start: NaiveDateTime,
    pub interval_minutes: i64,
    pub start_price: f64,
    /// Largest per-bar relative move.
    pub max_move: f64,
    pub atr_window: usize,
    pub labels: LabelSpec,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            rows: 3_000,
            seed: 42,
            start: NaiveDateTime::default(),
            interval_minutes: 60,
            start_price: 100.0,
            max_move: 0.004,
            atr_window: 14,
            labels: LabelSpec::default(),
        }
    }
}

/// Deterministic random-walk bars with Wilder ATR, price features and
/// TP/SL horizon labels.
pub fn synthetic_table(opts: &SyntheticOptions) -> Result<FeatureTable, TableError> {
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut price = opts.start_price;
    let mut raw = Vec::with_capacity(opts.rows);
    for i in 0..opts.rows {
        let step: f64 = rng.gen_range(-opts.max_move..=opts.max_move);
        let open = price;
        let close = price * (1.0 + step);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..=opts.max_move / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..=opts.max_move / 2.0));
        let timestamp = opts.start + chrono::Duration::minutes(opts.interval_minutes * i as i64);
        raw.push((timestamp, open, high, low, close));
        price = close;
    }

    let highs: Vec<f64> = raw.iter().map(|r| r.2).collect();
    let lows: Vec<f64> = raw.iter().map(|r| r.3).collect();
    let closes: Vec<f64> = raw.iter().map(|r| r.4).collect();
    let atr = wilder_atr(&highs, &lows, &closes, opts.atr_window);

    let bars: Vec<Bar> = raw
        .iter()
        .zip(&atr)
        .map(|(&(timestamp, open, high, low, close), &atr)| Bar {
            timestamp,
            open,
            high,
            low,
            close,
            atr,
        })
        .collect();

    let mut names: Vec<String> = crate::table::BAR_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![
        bars.iter().map(|b| b.open).collect(),
        highs,
        lows,
        closes,
        atr,
    ];
    for (name, values) in price_features(&bars) {
        names.push(name);
        columns.push(values);
    }

    let targets = opts.labels.apply(&bars);
    let rows = to_rows(&columns, bars.len());
    tracing::debug!(rows = bars.len(), seed = opts.seed, "generated synthetic table");
    FeatureTable::new(bars, names, rows, targets)
}
