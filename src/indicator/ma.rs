use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series, close_prices, validate_period};
use crate::model::PriceBar;

/// Simple Moving Average.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        validate_period(period)?;
        Ok(Self { period })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Sliding-window mean via a running sum. First value at `period - 1`.
    pub fn calculate_values(&self, values: &[f64]) -> Series {
        let mut result = vec![None; values.len()];
        let mut sum = 0.0;
        for (i, &value) in values.iter().enumerate() {
            sum += value;
            if i >= self.period {
                sum -= values[i - self.period];
            }
            if i + 1 >= self.period {
                result[i] = Some(sum / self.period as f64);
            }
        }
        result
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        self.calculate_values(&close_prices(bars))
    }
}

/// Exponential Moving Average.
///
/// Seeded with the SMA of the first `period` values. A `None` input yields
/// `None` and resets the recursion; the average is reseeded once `period`
/// consecutive values are available again.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        validate_period(period)?;
        Ok(Self { period })
    }

    pub fn calculate_values(&self, values: &[Option<f64>]) -> Series {
        let k = 2.0 / (self.period as f64 + 1.0);
        let mut result = vec![None; values.len()];
        let mut prev: Option<f64> = None;
        let mut run = 0;

        for (i, value) in values.iter().enumerate() {
            let Some(value) = *value else {
                prev = None;
                run = 0;
                continue;
            };
            run += 1;

            let ema = match prev {
                Some(p) => value * k + p * (1.0 - k),
                None if run >= self.period => {
                    // the trailing `period` inputs are all present here
                    values[i + 1 - self.period..=i].iter().flatten().sum::<f64>()
                        / self.period as f64
                }
                None => continue,
            };
            prev = Some(ema);
            result[i] = Some(ema);
        }

        result
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
        self.calculate_values(&closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::bars_from_closes;

    #[test]
    fn sma_period_zero_invalid() {
        assert!(Sma::new(0).is_err());
    }

    #[test]
    fn sma_short_input_is_all_none() {
        let sma = Sma::new(5).unwrap();
        let values = sma.calculate(&bars_from_closes(&[1.0; 4]));
        assert_eq!(values, vec![None; 4]);
    }

    #[test]
    fn sma_matches_window_means() {
        let sma = Sma::new(3).unwrap();
        let values = sma.calculate(&bars_from_closes(&[10.0, 11.0, 9.0, 12.0, 12.0]));
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!((values[2].unwrap() - 10.0).abs() < 1e-9);
        assert!((values[3].unwrap() - 32.0 / 3.0).abs() < 1e-9);
        assert!((values[4].unwrap() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn sma_valid_count_is_n_minus_period_plus_one() {
        let closes: Vec<f64> = (0..40).map(|i| (i as f64 * 0.7).sin() * 10.0 + 50.0).collect();
        for period in [1, 2, 5, 14, 40] {
            let values = Sma::new(period).unwrap().calculate_values(&closes);
            let valid = values.iter().filter(|v| v.is_some()).count();
            assert_eq!(valid, closes.len() - period + 1);
            for (i, v) in values.iter().enumerate().skip(period - 1) {
                let mean = closes[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
                assert!((v.unwrap() - mean).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn ema_period_zero_invalid() {
        assert!(Ema::new(0).is_err());
    }

    #[test]
    fn ema_seed_equals_sma() {
        let ema = Ema::new(3).unwrap();
        let values = ema.calculate(&bars_from_closes(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!((values[2].unwrap() - 2.0).abs() < 1e-9);
        // k = 0.5 -> 4 * 0.5 + 2 * 0.5
        assert!((values[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn ema_flat_prices() {
        let ema = Ema::new(3).unwrap();
        let values = ema.calculate(&bars_from_closes(&[10.0; 6]));
        for v in values.iter().flatten() {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn ema_none_input_propagates() {
        let ema = Ema::new(2).unwrap();
        let input = vec![Some(1.0), Some(3.0), None, Some(5.0)];
        let values = ema.calculate_values(&input);
        assert_eq!(values[2], None);
    }

    #[test]
    fn ema_reseeds_after_gap() {
        let ema = Ema::new(2).unwrap();
        let input = vec![
            Some(1.0),
            Some(3.0),
            Some(5.0),
            None,
            Some(10.0),
            Some(20.0),
            Some(30.0),
        ];
        let values = ema.calculate_values(&input);
        assert!((values[1].unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(values[3], None);
        // one value after the gap is not enough to reseed
        assert_eq!(values[4], None);
        // reseeded from the SMA of [10, 20]
        assert!((values[5].unwrap() - 15.0).abs() < 1e-9);
        let k = 2.0 / 3.0;
        assert!((values[6].unwrap() - (30.0 * k + 15.0 * (1.0 - k))).abs() < 1e-9);
    }
}
