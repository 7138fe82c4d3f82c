use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, Series, close_prices};
use crate::model::PriceBar;

/// Upper, middle and lower band series, each aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    sma: Sma,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if std_dev_multiplier <= 0.0 || !std_dev_multiplier.is_finite() {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be > 0".into(),
            });
        }
        Ok(Self {
            sma: Sma::new(period)?,
            std_dev_multiplier,
        })
    }

    /// Middle band is the SMA; the bands sit `multiplier` population standard
    /// deviations of the trailing window away from it.
    pub fn calculate_bands(&self, values: &[f64]) -> Bands {
        let period = self.sma.period();
        let middle = self.sma.calculate_values(values);
        let mut upper = vec![None; values.len()];
        let mut lower = vec![None; values.len()];

        for (i, mid) in middle.iter().enumerate() {
            let Some(mid) = *mid else {
                continue;
            };
            let window = &values[i + 1 - period..=i];
            let sum: f64 = window.iter().sum();
            let sq_sum: f64 = window.iter().map(|v| v * v).sum();
            let mean = sum / period as f64;
            let variance = sq_sum / period as f64 - mean * mean;
            let std_dev = variance.max(0.0).sqrt();
            upper[i] = Some(mid + self.std_dev_multiplier * std_dev);
            lower[i] = Some(mid - self.std_dev_multiplier * std_dev);
        }

        Bands {
            upper,
            middle,
            lower,
        }
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_bars(&self) -> usize {
        self.sma.period()
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, bars: &[PriceBar]) -> Series {
        self.calculate_bands(&close_prices(bars)).middle
    }
}
