use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, Series};
use crate::model::PriceBar;

/// MACD line: fast EMA minus slow EMA.
#[derive(Debug, Clone, Copy)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    slow_period: usize,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast: Ema::new(fast_period)?,
            slow: Ema::new(slow_period)?,
            slow_period,
        })
    }

    /// `None` wherever either EMA is `None`.
    pub fn calculate_values(&self, values: &[Option<f64>]) -> Series {
        let fast = self.fast.calculate_values(values);
        let slow = self.slow.calculate_values(values);
        fast.into_iter()
            .zip(slow)
            .map(|(f, s)| Some(f? - s?))
            .collect()
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn required_bars(&self) -> usize {
        self.slow_period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
        self.calculate_values(&closes)
    }
}
