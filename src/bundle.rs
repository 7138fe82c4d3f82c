//! Indicator orchestration: runs the requested indicators over a bar series,
//! derives per-indicator value ranges for independent scaling, and reduces a
//! bundle to the flat value map stored with shipped charts.

use std::collections::BTreeMap;

use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IndicatorError;
use crate::indicator::atr::Atr;
use crate::indicator::bollinger::{Bands, BollingerBands};
use crate::indicator::ma::Sma;
use crate::indicator::macd::Macd;
use crate::indicator::rsi::Rsi;
use crate::indicator::stochastic::Stochastic;
use crate::indicator::trendline::{LinearFit, Trendline};
use crate::indicator::volume::Obv;
use crate::indicator::{Indicator, Series, close_prices, last_value};
use crate::model::{ActiveIndicators, IndicatorKind, PriceBar};

fn default_ma_short() -> usize {
    20
}

fn default_ma_long() -> usize {
    50
}

fn default_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_multiplier() -> f64 {
    2.0
}

/// Periods and multipliers for every indicator on the technical menu.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_ma_short")]
    pub ma_short: usize,
    #[serde(default = "default_ma_long")]
    pub ma_long: usize,
    #[serde(default = "default_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_multiplier")]
    pub bollinger_multiplier: f64,
    #[serde(default = "default_period")]
    pub stochastic_period: usize,
    #[serde(default = "default_period")]
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_short: default_ma_short(),
            ma_long: default_ma_long(),
            rsi_period: default_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            bollinger_period: default_bollinger_period(),
            bollinger_multiplier: default_bollinger_multiplier(),
            stochastic_period: default_period(),
            atr_period: default_period(),
        }
    }
}

/// `[min, max]` over the non-`None` values of an indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// `None` when there is no finite value.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| {
                Some(match range {
                    None => Self { min: v, max: v },
                    Some(r) => Self {
                        min: r.min.min(v),
                        max: r.max.max(v),
                    },
                })
            })
    }

    /// Width of the range; a collapsed range counts as a unit range.
    pub fn span(&self) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 { 1.0 } else { span }
    }

    /// Expand both sides by `fraction` of the raw width.
    pub fn padded(&self, fraction: f64) -> Self {
        let pad = (self.max - self.min) * fraction;
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Position of `value` within the range, `0.0` at `min` and `1.0` at `max`.
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.span()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorData {
    Line(Series),
    MovingAverage { short: Series, long: Series },
    Bands(Bands),
}

impl IndicatorData {
    /// Every aligned sub-series, used for range pooling.
    pub fn all_series(&self) -> Vec<&Series> {
        match self {
            Self::Line(series) => vec![series],
            Self::MovingAverage { short, long } => vec![short, long],
            Self::Bands(bands) => vec![&bands.upper, &bands.middle, &bands.lower],
        }
    }

    fn range(&self) -> Option<ValueRange> {
        ValueRange::from_values(self.all_series().into_iter().flatten().flatten().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorEntry {
    pub data: IndicatorData,
    /// `None` when the indicator has no values for this history.
    pub range: Option<ValueRange>,
}

/// Indicators built from validated parameters.
#[derive(Debug, Clone)]
pub struct IndicatorSuite {
    params: IndicatorParams,
    ma_short: Sma,
    ma_long: Sma,
    rsi: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
    stochastic: Stochastic,
    atr: Atr,
}

impl IndicatorSuite {
    pub fn new(params: IndicatorParams) -> Result<Self, Report<IndicatorError>> {
        if params.ma_short >= params.ma_long {
            bail!(IndicatorError::InvalidParameter {
                name: "ma_short must be < ma_long".into(),
            });
        }
        Ok(Self {
            params,
            ma_short: Sma::new(params.ma_short)?,
            ma_long: Sma::new(params.ma_long)?,
            rsi: Rsi::new(params.rsi_period)?,
            macd: Macd::new(params.macd_fast, params.macd_slow)?,
            bollinger: BollingerBands::new(params.bollinger_period, params.bollinger_multiplier)?,
            stochastic: Stochastic::new(params.stochastic_period)?,
            atr: Atr::new(params.atr_period)?,
        })
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    fn required_bars(&self, kind: IndicatorKind) -> usize {
        match kind {
            IndicatorKind::MovingAverage => self.ma_long.required_bars(),
            IndicatorKind::Rsi => self.rsi.required_bars(),
            IndicatorKind::Macd => self.macd.required_bars(),
            IndicatorKind::Bollinger => self.bollinger.required_bars(),
            IndicatorKind::Stochastic => self.stochastic.required_bars(),
            IndicatorKind::Atr => self.atr.required_bars(),
            IndicatorKind::Obv => Obv.required_bars(),
            IndicatorKind::Trendline => Trendline.required_bars(),
        }
    }

    fn calculate(&self, kind: IndicatorKind, bars: &[PriceBar], closes: &[f64]) -> IndicatorData {
        match kind {
            IndicatorKind::MovingAverage => IndicatorData::MovingAverage {
                short: self.ma_short.calculate_values(closes),
                long: self.ma_long.calculate_values(closes),
            },
            IndicatorKind::Rsi => IndicatorData::Line(self.rsi.calculate_values(closes)),
            IndicatorKind::Macd => IndicatorData::Line(self.macd.calculate(bars)),
            IndicatorKind::Bollinger => IndicatorData::Bands(self.bollinger.calculate_bands(closes)),
            IndicatorKind::Stochastic => IndicatorData::Line(self.stochastic.calculate(bars)),
            IndicatorKind::Atr => IndicatorData::Line(self.atr.calculate(bars)),
            IndicatorKind::Obv => IndicatorData::Line(Obv.calculate(bars)),
            IndicatorKind::Trendline => IndicatorData::Line(Trendline.calculate(bars)),
        }
    }
}

impl Default for IndicatorSuite {
    fn default() -> Self {
        Self::new(IndicatorParams::default()).expect("default indicator parameters are valid")
    }
}

/// Computed indicators keyed by kind. Rebuilt wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorBundle {
    entries: BTreeMap<IndicatorKind, IndicatorEntry>,
    ma_short: usize,
    ma_long: usize,
    /// Latest value of the trendline fitted over every close.
    trend: Option<f64>,
}

impl IndicatorBundle {
    pub fn compute(bars: &[PriceBar], active: &ActiveIndicators, suite: &IndicatorSuite) -> Self {
        let closes = close_prices(bars);
        let entries = active
            .iter()
            .map(|kind| {
                let data = suite.calculate(kind, bars, &closes);
                let range = data.range();
                if range.is_none() {
                    debug!(
                        indicator = %kind,
                        bars = bars.len(),
                        required = suite.required_bars(kind),
                        "indicator has no values for this history"
                    );
                }
                (kind, IndicatorEntry { data, range })
            })
            .collect();

        let fit_input: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
        let trend = match (LinearFit::fit(&fit_input), closes.len().checked_sub(1)) {
            (Some(fit), Some(last)) => Some(fit.value_at(last)),
            _ => None,
        };

        Self {
            entries,
            ma_short: suite.params().ma_short,
            ma_long: suite.params().ma_long,
            trend,
        }
    }

    pub fn get(&self, kind: IndicatorKind) -> Option<&IndicatorEntry> {
        self.entries.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndicatorKind, &IndicatorEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ma_short_label(&self) -> String {
        format!("MA{}", self.ma_short)
    }

    pub fn ma_long_label(&self) -> String {
        format!("MA{}", self.ma_long)
    }

    /// Trend-Relative Index: percent distance of `last_close` from the latest
    /// value of the fitted trendline, whether or not the trendline is drawn.
    /// `None` without bars or when the trend value is zero.
    pub fn trend_relative_index(&self, last_close: f64) -> Option<f64> {
        let trend = self.trend?;
        if trend == 0.0 {
            return None;
        }
        Some((last_close - trend) / trend * 100.0)
    }

    /// Reduce to `{label: latest value}` for persistence.
    ///
    /// The moving average splits into its short and long keys; Bollinger Bands
    /// report the middle band. Indicators without a value are omitted.
    pub fn snapshot_values(&self) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        for (kind, entry) in self.iter() {
            match &entry.data {
                IndicatorData::MovingAverage { short, long } => {
                    if let Some(v) = last_value(short) {
                        values.insert(self.ma_short_label(), v);
                    }
                    if let Some(v) = last_value(long) {
                        values.insert(self.ma_long_label(), v);
                    }
                }
                IndicatorData::Bands(bands) => {
                    if let Some(v) = last_value(&bands.middle) {
                        values.insert(kind.as_str().to_string(), v);
                    }
                }
                IndicatorData::Line(series) => {
                    if let Some(v) = last_value(series) {
                        values.insert(kind.as_str().to_string(), v);
                    }
                }
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::bars_from_closes;

    fn active(kinds: &[IndicatorKind]) -> ActiveIndicators {
        kinds.iter().copied().collect()
    }

    fn rising(n: usize) -> Vec<PriceBar> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        bars_from_closes(&closes)
    }

    #[test]
    fn computes_only_requested_indicators() {
        let bars = rising(60);
        let bundle = IndicatorBundle::compute(
            &bars,
            &active(&[IndicatorKind::Rsi, IndicatorKind::Obv]),
            &IndicatorSuite::default(),
        );
        assert!(bundle.get(IndicatorKind::Rsi).is_some());
        assert!(bundle.get(IndicatorKind::Obv).is_some());
        assert!(bundle.get(IndicatorKind::Macd).is_none());
    }

    #[test]
    fn series_are_aligned_with_bars() {
        let bars = rising(30);
        let all: ActiveIndicators = IndicatorKind::ALL.into_iter().collect();
        let bundle = IndicatorBundle::compute(&bars, &all, &IndicatorSuite::default());
        for (_, entry) in bundle.iter() {
            for series in entry.data.all_series() {
                assert_eq!(series.len(), bars.len());
            }
        }
    }

    #[test]
    fn moving_average_range_pools_both_series() {
        let params = IndicatorParams {
            ma_short: 2,
            ma_long: 3,
            ..IndicatorParams::default()
        };
        let suite = IndicatorSuite::new(params).unwrap();
        let bars = bars_from_closes(&[1.0, 3.0, 8.0, 2.0]);
        let bundle = IndicatorBundle::compute(&bars, &active(&[IndicatorKind::MovingAverage]), &suite);
        let range = bundle.get(IndicatorKind::MovingAverage).unwrap().range.unwrap();
        // short: 2, 5.5, 5; long: 4, 13/3
        assert!((range.min - 2.0).abs() < 1e-9);
        assert!((range.max - 5.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_indicator_has_no_range() {
        let bars = rising(10);
        let bundle = IndicatorBundle::compute(
            &bars,
            &active(&[IndicatorKind::Macd, IndicatorKind::Bollinger]),
            &IndicatorSuite::default(),
        );
        assert_eq!(bundle.get(IndicatorKind::Macd).unwrap().range, None);
        assert_eq!(bundle.get(IndicatorKind::Bollinger).unwrap().range, None);
        assert!(bundle.snapshot_values().is_empty());
    }

    #[test]
    fn snapshot_splits_moving_average_keys() {
        let bars = rising(60);
        let bundle = IndicatorBundle::compute(
            &bars,
            &active(&[
                IndicatorKind::MovingAverage,
                IndicatorKind::Bollinger,
                IndicatorKind::Rsi,
            ]),
            &IndicatorSuite::default(),
        );
        let values = bundle.snapshot_values();
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["BB", "MA20", "MA50", "RSI"]);
        // mean of 140..=159
        assert!((values["MA20"] - 149.5).abs() < 1e-9);
        assert!((values["BB"] - 149.5).abs() < 1e-9);
        assert!((values["RSI"] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_moving_average_pair_rejected() {
        let params = IndicatorParams {
            ma_short: 50,
            ma_long: 20,
            ..IndicatorParams::default()
        };
        assert!(IndicatorSuite::new(params).is_err());
    }

    #[test]
    fn value_range_zero_span_is_unit() {
        let range = ValueRange::from_values([5.0, 5.0]).unwrap();
        assert_eq!(range.span(), 1.0);
        assert_eq!(ValueRange::from_values(Vec::<f64>::new()), None);
    }

    #[test]
    fn value_range_padding() {
        let range = ValueRange { min: 10.0, max: 20.0 }.padded(0.05);
        assert!((range.min - 9.5).abs() < 1e-9);
        assert!((range.max - 20.5).abs() < 1e-9);
    }

    fn tri(closes: &[f64], kinds: &[IndicatorKind]) -> Option<f64> {
        let bars = bars_from_closes(closes);
        let bundle = IndicatorBundle::compute(&bars, &active(kinds), &IndicatorSuite::default());
        bundle.trend_relative_index(bars.last()?.close)
    }

    #[test]
    fn tri_on_linear_series_is_zero() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!(tri(&closes, &[IndicatorKind::Trendline]).unwrap().abs() < 1e-9);
    }

    #[test]
    fn tri_measures_distance_from_trend() {
        // fit through (0,10),(1,10),(2,16): slope 3, intercept 9 -> trend at 2 is 15
        let value = tri(&[10.0, 10.0, 16.0], &[IndicatorKind::Trendline]).unwrap();
        assert!((value - (16.0 - 15.0) / 15.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn tri_does_not_need_active_trendline() {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        *closes.last_mut().unwrap() += 5.0;
        let with_line = tri(&closes, &[IndicatorKind::Trendline]).unwrap();
        let without = tri(&closes, &[IndicatorKind::Rsi]).unwrap();
        assert!((with_line - without).abs() < 1e-12);
        assert!(tri(&closes, &[]).is_some());

        // least-squares fit over 0..30 with the last point lifted by 5
        let n = closes.len() as f64;
        let (sx, sy) = (n * (n - 1.0) / 2.0, closes.iter().sum::<f64>());
        let sxy: f64 = closes.iter().enumerate().map(|(i, c)| i as f64 * c).sum();
        let sxx: f64 = (0..30).map(|i| (i * i) as f64).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        let trend = slope * 29.0 + (sy - slope * sx) / n;
        let expected = (134.0 - trend) / trend * 100.0;
        assert!((without - expected).abs() < 1e-9);
        assert!(without > 3.0 && without < 3.5);
    }

    #[test]
    fn tri_undefined_without_bars_or_zero_trend() {
        assert_eq!(tri(&[], &[]), None);
        assert_eq!(IndicatorBundle::default().trend_relative_index(10.0), None);
        assert_eq!(tri(&[0.0, 0.0], &[IndicatorKind::Rsi]), None);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: IndicatorParams = serde_json::from_str(r#"{"rsi_period": 7}"#).unwrap();
        assert_eq!(params.rsi_period, 7);
        assert_eq!(params.ma_long, 50);
        assert_eq!(params.bollinger_multiplier, 2.0);
    }
}
