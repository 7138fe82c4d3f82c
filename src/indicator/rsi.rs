use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series, close_prices, validate_period};
use crate::model::PriceBar;

/// RSI (Relative Strength Index) using Wilder's smoothing method.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        validate_period(period)?;
        Ok(Self { period })
    }

    /// First value lands at index `period`, after `period` price changes.
    pub fn calculate_values(&self, values: &[f64]) -> Series {
        let period = self.period as f64;
        let mut result = vec![None; values.len()];
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;

        for i in 1..values.len() {
            let change = values[i] - values[i - 1];
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            if i <= self.period {
                // Seed using simple average of first `period` gains/losses
                avg_gain += gain;
                avg_loss += loss;
                if i == self.period {
                    avg_gain /= period;
                    avg_loss /= period;
                    result[i] = Some(rsi_value(avg_gain, avg_loss));
                }
            } else {
                avg_gain = (avg_gain * (period - 1.0) + gain) / period;
                avg_loss = (avg_loss * (period - 1.0) + loss) / period;
                result[i] = Some(rsi_value(avg_gain, avg_loss));
            }
        }

        result
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        self.calculate_values(&close_prices(bars))
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
