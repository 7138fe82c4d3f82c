//! Analysis info bar: latest price, TRI and the latest value of each active
//! indicator.

use std::fmt;

use crate::bundle::{IndicatorBundle, IndicatorData};
use crate::indicator::last_value;
use crate::model::PriceBar;

const PLACEHOLDER: &str = "n/a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    parts: Vec<String>,
}

impl AnalysisSummary {
    pub fn build(bars: &[PriceBar], bundle: &IndicatorBundle) -> Self {
        let Some(price) = bars.last().map(|b| b.close) else {
            return Self { parts: Vec::new() };
        };

        let mut parts = vec![format!("Price: ${price:.2}")];
        if let Some(tri) = bundle.trend_relative_index(price) {
            parts.push(format!("TRI: {}{tri:.2}%", if tri >= 0.0 { "+" } else { "" }));
        }

        for (kind, entry) in bundle.iter() {
            let part = match &entry.data {
                IndicatorData::Bands(bands) => {
                    match (last_value(&bands.upper), last_value(&bands.middle), last_value(&bands.lower)) {
                        (Some(u), Some(m), Some(l)) => format!("{kind}: {u:.2} / {m:.2} / {l:.2}"),
                        _ => format!("{kind}: {PLACEHOLDER}"),
                    }
                }
                IndicatorData::MovingAverage { short, long } => {
                    let legs: Vec<String> = [
                        (bundle.ma_short_label(), last_value(short)),
                        (bundle.ma_long_label(), last_value(long)),
                    ]
                    .into_iter()
                    .filter_map(|(label, v)| v.map(|v| format!("{label}: {v:.2}")))
                    .collect();
                    if legs.is_empty() {
                        format!("{kind}: {PLACEHOLDER}")
                    } else {
                        legs.join(" | ")
                    }
                }
                IndicatorData::Line(series) => match last_value(series) {
                    Some(v) => format!("{kind}: {v:.2}"),
                    None => format!("{kind}: {PLACEHOLDER}"),
                },
            };
            parts.push(part);
        }

        Self { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            write!(f, "No analysis data")
        } else {
            write!(f, "{}", self.parts.join("  "))
        }
    }
}
