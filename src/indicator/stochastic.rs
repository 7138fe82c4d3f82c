use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series, validate_period};
use crate::model::PriceBar;

/// Stochastic oscillator %K over bar highs and lows.
#[derive(Debug, Clone, Copy)]
pub struct Stochastic {
    period: usize,
}

impl Stochastic {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        validate_period(period)?;
        Ok(Self { period })
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    /// A flat window (highest high == lowest low) yields `0.0`, not `None`.
    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let mut result = vec![None; bars.len()];
        for i in self.period.saturating_sub(1)..bars.len() {
            let window = &bars[i + 1 - self.period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let range = highest - lowest;
            result[i] = Some(if range == 0.0 {
                0.0
            } else {
                (bars[i].close - lowest) / range * 100.0
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::{bar, bars_from_closes};

    #[test]
    fn stochastic_period_zero_invalid() {
        assert!(Stochastic::new(0).is_err());
    }

    #[test]
    fn stochastic_flat_window_is_zero() {
        let bars: Vec<_> = (0..14).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0, 1.0)).collect();
        let values = Stochastic::new(14).unwrap().calculate(&bars);
        assert!(values[..13].iter().all(Option::is_none));
        assert_eq!(values[13], Some(0.0));
    }

    #[test]
    fn stochastic_close_at_extremes() {
        let bars = vec![
            bar(0, 10.0, 12.0, 8.0, 10.0, 1.0),
            bar(1, 10.0, 14.0, 9.0, 14.0, 1.0),
            bar(2, 14.0, 15.0, 6.0, 6.0, 1.0),
        ];
        let values = Stochastic::new(2).unwrap().calculate(&bars);
        assert_eq!(values[0], None);
        // window [0,1]: high 14, low 8, close 14
        assert!((values[1].unwrap() - 100.0).abs() < 1e-9);
        // window [1,2]: high 15, low 6, close 6
        assert!((values[2].unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn stochastic_short_input_is_all_none() {
        let values = Stochastic::new(5)
            .unwrap()
            .calculate(&bars_from_closes(&[1.0, 2.0]));
        assert_eq!(values, vec![None, None]);
    }
}
