use crate::indicator::{Indicator, Series};
use crate::model::PriceBar;

/// Least-squares fit of value against index position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Fit over the non-`None` points only. `None` when there are no points.
    ///
    /// A single point fits a flat line through it.
    pub fn fit(values: &[Option<f64>]) -> Option<Self> {
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        let mut count = 0.0;
        for (i, y) in values.iter().enumerate() {
            let Some(y) = *y else {
                continue;
            };
            let x = i as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
            count += 1.0;
        }
        if count == 0.0 {
            return None;
        }

        let denominator = count * sum_xx - sum_x * sum_x;
        let slope = if denominator == 0.0 {
            0.0
        } else {
            (count * sum_xy - sum_x * sum_y) / denominator
        };
        let intercept = (sum_y - slope * sum_x) / count;
        Some(Self { slope, intercept })
    }

    pub fn value_at(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Trendline;

impl Trendline {
    /// Fitted value at every index, or all `None` without any input value.
    pub fn calculate_values(&self, values: &[Option<f64>]) -> Series {
        match LinearFit::fit(values) {
            Some(fit) => (0..values.len()).map(|i| Some(fit.value_at(i))).collect(),
            None => vec![None; values.len()],
        }
    }
}

impl Indicator for Trendline {
    fn name(&self) -> &str {
        "trendline"
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
        self.calculate_values(&closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trendline_recovers_linear_coefficients() {
        let (a, b) = (1.75, -42.5);
        let values: Vec<Option<f64>> = (0..60).map(|i| Some(a * i as f64 + b)).collect();
        let fit = LinearFit::fit(&values).unwrap();
        assert!((fit.slope - a).abs() < 1e-9);
        assert!((fit.intercept - b).abs() < 1e-9);

        let fitted = Trendline.calculate_values(&values);
        for (i, v) in fitted.iter().enumerate() {
            assert!((v.unwrap() - values[i].unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn trendline_skips_none_but_fills_every_index() {
        let values = vec![None, Some(2.0), None, Some(4.0), None];
        let fitted = Trendline.calculate_values(&values);
        assert!(fitted.iter().all(Option::is_some));
        assert!((fitted[0].unwrap() - 1.0).abs() < 1e-9);
        assert!((fitted[4].unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn trendline_without_values_is_all_none() {
        assert_eq!(Trendline.calculate_values(&[None, None]), vec![None, None]);
        assert!(Trendline.calculate_values(&[]).is_empty());
    }

    #[test]
    fn trendline_single_point_is_flat() {
        let fitted = Trendline.calculate_values(&[None, Some(7.0), None]);
        assert_eq!(fitted, vec![Some(7.0), Some(7.0), Some(7.0)]);
    }
}
