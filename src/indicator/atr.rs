use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series, validate_period};
use crate::model::PriceBar;

/// Average True Range with Wilder smoothing.
#[derive(Debug, Clone, Copy)]
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        validate_period(period)?;
        Ok(Self { period })
    }
}

pub fn true_range(bar: &PriceBar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        "atr"
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    /// Seeded at index `period` with the mean of the true ranges of bars
    /// `1..=period`; the first bar has no previous close and no true range.
    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let mut result = vec![None; bars.len()];
        if bars.len() <= self.period {
            return result;
        }

        let ranges: Vec<f64> = bars
            .windows(2)
            .map(|w| true_range(&w[1], w[0].close))
            .collect();
        // ranges[i - 1] is the true range of bar i
        let period = self.period as f64;
        let mut atr = ranges[..self.period].iter().sum::<f64>() / period;
        result[self.period] = Some(atr);

        for i in self.period + 1..bars.len() {
            atr = (atr * (period - 1.0) + ranges[i - 1]) / period;
            result[i] = Some(atr);
        }

        result
    }
}
