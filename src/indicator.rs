pub mod atr;
pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod stochastic;
pub mod trendline;
pub mod volume;

use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::model::PriceBar;

/// An indicator sequence aligned index-for-index with its input.
///
/// `None` marks positions without enough history; it is never zero-filled.
pub type Series = Vec<Option<f64>>;

/// A technical analysis indicator that operates on a slice of bars.
///
/// Bars must be in ascending chronological order (oldest first). The output
/// always has the same length as the input.
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one value.
    fn required_bars(&self) -> usize;

    fn calculate(&self, bars: &[PriceBar]) -> Series;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Last non-`None` value of a series.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

pub(crate) fn validate_period(period: usize) -> Result<(), Report<IndicatorError>> {
    if period == 0 {
        bail!(IndicatorError::InvalidParameter {
            name: "period must be > 0".into(),
        });
    }
    Ok(())
}
