//! Price data loading for the runner.
//!
//! Two sources:
//! 1. A CSV file with header columns `date,open,high,low,close[,volume]`
//! 2. Deterministic synthetic bars (`--synthetic`), for demos and tests
//!
//! Both yield a validated `PriceSeries`. Synthetic data is a developer-only
//! mode and is logged as such.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use stratlab_core::domain::{Bar, PriceSeries, SeriesError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {reason}")]
    Parse { line: u64, reason: String },

    #[error("invalid price data: {0}")]
    Series(#[from] SeriesError),

    #[error("no bars for '{symbol}' between {start:?} and {end:?}")]
    EmptyRange {
        symbol: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Optional inclusive date window applied after loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// One CSV row. Column order is free; names are matched case-sensitively.
#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load a daily price CSV into a validated series.
///
/// Rows outside `range` are dropped before validation. An empty file or a
/// range that keeps no rows is an `EmptyRange` error.
pub fn load_csv(path: &Path, symbol: &str, range: DateRange) -> Result<PriceSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_csv(file, symbol, range)?;
    debug!(
        path = %path.display(),
        symbol,
        bars = series.len(),
        "loaded price CSV"
    );
    Ok(series)
}

/// Parse CSV price data from any reader.
pub fn read_csv<R: std::io::Read>(
    reader: R,
    symbol: &str,
    range: DateRange,
) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();

    let mut bars = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let row: CsvRow = record.deserialize(Some(&headers))?;
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT).map_err(|e| {
            LoadError::Parse {
                line,
                reason: format!("bad date '{}': {e}", row.date),
            }
        })?;
        if !range.contains(date) {
            continue;
        }

        let mut bar = Bar::new(date, row.open, row.high, row.low, row.close);
        if let Some(v) = row.volume {
            // Share counts: whole, non-negative and within u64.
            if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v >= u64::MAX as f64 {
                return Err(LoadError::Parse {
                    line,
                    reason: format!("bad volume {v}"),
                });
            }
            bar = bar.with_volume(v as u64);
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::EmptyRange {
            symbol: symbol.to_string(),
            start: range.start,
            end: range.end,
        });
    }
    Ok(PriceSeries::new(symbol, bars)?)
}

/// Deterministic BLAKE3 hash over every bar of a series.
///
/// Covers the symbol, dates and OHLCV values in series order.
pub fn dataset_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.unwrap_or(0).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate a synthetic weekday random walk for `symbol`.
///
/// Starts at 100.0; the RNG is seeded from the BLAKE3 hash of the symbol, so
/// the same symbol and range always give the same bars.
pub fn synthetic_series(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, LoadError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    warn!(symbol, %start, %end, "generating synthetic price data");

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar::new(current, open, high, low, close).with_volume(volume));

        price = close;
        current += chrono::Duration::days(1);
    }

    if bars.is_empty() {
        return Err(LoadError::EmptyRange {
            symbol: symbol.to_string(),
            start: Some(start),
            end: Some(end),
        });
    }
    Ok(PriceSeries::new(symbol, bars)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const SAMPLE: &str = "\
date,open,high,low,close,volume
2024-01-02,100.0,102.0,99.0,101.0,1000
2024-01-03,101.0,103.0,100.0,102.0,1100
2024-01-04,102.0,104.0,101.0,103.5,900
";

    #[test]
    fn reads_csv_with_volume() {
        let series = read_csv(SAMPLE.as_bytes(), "SPY", DateRange::default()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "SPY");
        assert_eq!(series.first().date, d(2024, 1, 2));
        assert_eq!(series.last().close, 103.5);
        assert_eq!(series.bars()[1].volume, Some(1100));
    }

    #[test]
    fn volume_column_is_optional() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,0.5,1.5\n";
        let series = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap();
        assert_eq!(series.bars()[0].volume, None);
    }

    #[test]
    fn fractional_or_negative_volume_is_rejected() {
        for volume in ["1000.5", "-5", "nan"] {
            let csv = format!("date,open,high,low,close,volume\n2024-01-02,1,2,0.5,1.5,{volume}\n");
            let err = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap_err();
            match err {
                LoadError::Parse { line, reason } => {
                    assert_eq!(line, 2);
                    assert!(reason.contains("bad volume"), "{reason}");
                }
                other => panic!("{volume}: expected Parse, got {other:?}"),
            }
        }

        let whole = "date,open,high,low,close,volume\n2024-01-02,1,2,0.5,1.5,1200.0\n";
        let series = read_csv(whole.as_bytes(), "X", DateRange::default()).unwrap();
        assert_eq!(series.bars()[0].volume, Some(1200));
    }

    #[test]
    fn filters_by_inclusive_range() {
        let range = DateRange::new(Some(d(2024, 1, 3)), Some(d(2024, 1, 4)));
        let series = read_csv(SAMPLE.as_bytes(), "SPY", range).unwrap();
        assert_eq!(series.closes(), vec![102.0, 103.5]);
    }

    #[test]
    fn empty_range_is_an_error() {
        let range = DateRange::new(Some(d(2025, 1, 1)), None);
        let err = read_csv(SAMPLE.as_bytes(), "SPY", range).unwrap_err();
        assert!(matches!(err, LoadError::EmptyRange { .. }));
    }

    #[test]
    fn missing_column_is_csv_error() {
        let csv = "date,open,high,close\n2024-01-02,1,2,1.5\n";
        let err = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)), "{err}");
    }

    #[test]
    fn bad_date_reports_line() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,0.5,1.5\n01/03/2024,1,2,0.5,1.5\n";
        let err = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap_err();
        match err {
            LoadError::Parse { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("01/03/2024"));
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_dates_fail_validation() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,0.5,1.5\n2024-01-02,1,2,0.5,1.5\n";
        let err = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Series(SeriesError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn non_positive_price_fails_validation() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,0,1.5\n";
        let err = read_csv(csv.as_bytes(), "X", DateRange::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Series(SeriesError::InvalidPrice { field: "low", .. })
        ));
    }

    #[test]
    fn load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let series = load_csv(file.path(), "SPY", DateRange::default()).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn load_csv_missing_file_is_io_error() {
        let err = load_csv(Path::new("/nonexistent/prices.csv"), "SPY", DateRange::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn synthetic_is_deterministic_and_skips_weekends() {
        let a = synthetic_series("TEST", d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let b = synthetic_series("TEST", d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.first().open, 100.0);
        assert!(a.bars().iter().all(|bar| {
            !matches!(bar.date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
        }));
        assert!(a.bars().iter().all(|bar| bar.is_sane()));

        let other = synthetic_series("OTHER", d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        assert_ne!(a.closes(), other.closes());
    }

    #[test]
    fn synthetic_weekend_only_range_is_empty() {
        let err = synthetic_series("TEST", d(2024, 1, 6), d(2024, 1, 7)).unwrap_err();
        assert!(matches!(err, LoadError::EmptyRange { .. }));
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let a = read_csv(SAMPLE.as_bytes(), "SPY", DateRange::default()).unwrap();
        let b = read_csv(SAMPLE.as_bytes(), "SPY", DateRange::default()).unwrap();
        assert_eq!(dataset_hash(&a), dataset_hash(&b));

        let changed = SAMPLE.replace("103.5", "103.6");
        let c = read_csv(changed.as_bytes(), "SPY", DateRange::default()).unwrap();
        assert_ne!(dataset_hash(&a), dataset_hash(&c));
    }
}
