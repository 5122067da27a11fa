//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One OHLC sample plus the average true range computed for it.
///
/// Further indicator columns belong to the feature table that owns the bar
/// series; the simulator only needs price and ATR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub atr: f64,
}

impl Bar {
    /// ATR normalized by close. NaN when the close is zero or ATR is missing.
    pub fn volatility_ratio(&self) -> f64 {
        if self.close == 0.0 {
            return f64::NAN;
        }
        self.atr / self.close
    }

    /// True when the ATR can size stop-loss/take-profit distances.
    pub fn has_usable_atr(&self) -> bool {
        !self.atr.is_nan() && self.atr > 0.0
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            atr: 2.06,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn volatility_ratio_is_atr_over_close() {
        let bar = sample_bar();
        assert!((bar.volatility_ratio() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn unusable_atr_detected() {
        let mut bar = sample_bar();
        bar.atr = f64::NAN;
        assert!(!bar.has_usable_atr());
        bar.atr = 0.0;
        assert!(!bar.has_usable_atr());
        bar.atr = -1.0;
        assert!(!bar.has_usable_atr());
    }
}
