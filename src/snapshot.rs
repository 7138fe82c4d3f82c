//! Shipped chart records.
//!
//! A snapshot keeps the raw bars and indicator selection next to the reduced
//! values shown at ship time, so the values can be recomputed and checked
//! later without storing any series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::bundle::{IndicatorBundle, IndicatorParams, IndicatorSuite};
use crate::error::{IndicatorError, OutputError};
use crate::model::{ActiveIndicators, IndicatorKind, PriceBar, Timeframe};
use crate::render::{CanvasSize, ChartStatus, ChartView, RenderOutput, Renderer};
use crate::session::ChartSession;
use crate::smoothing::{default_window, smooth_closes};

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub raw_data: Vec<PriceBar>,
    #[serde(deserialize_with = "known_indicators")]
    pub active_indicators: ActiveIndicators,
    #[serde(default)]
    pub params: IndicatorParams,
    pub price: f64,
    pub tri: Option<f64>,
    pub indicator_values: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// Drops indicator names this build does not know, with a warning.
fn known_indicators<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActiveIndicators, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names
        .iter()
        .filter_map(|name| {
            let kind = IndicatorKind::from_str(name);
            if kind.is_none() {
                warn!(indicator = %name, "ignoring unknown indicator in stored snapshot");
            }
            kind
        })
        .collect())
}

/// Values derived from a snapshot's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub indicator_values: BTreeMap<String, f64>,
    pub tri: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verification {
    /// Keys whose stored and recomputed values differ, or exist on one side only.
    pub mismatched: Vec<String>,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.mismatched.is_empty()
    }
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

impl ChartSnapshot {
    /// `None` until the session has loaded bars.
    pub fn capture(session: &ChartSession) -> Option<Self> {
        let timeframe = session.timeframe()?;
        let price = session.latest_close()?;
        Some(Self {
            id: Uuid::new_v4(),
            symbol: session.symbol().to_owned(),
            timeframe,
            raw_data: session.bars().to_vec(),
            active_indicators: session.active().clone(),
            params: *session.suite().params(),
            price,
            tri: session.trend_relative_index(),
            indicator_values: session.bundle().snapshot_values(),
            timestamp: Utc::now(),
        })
    }

    pub fn bundle(&self) -> Result<IndicatorBundle, Report<IndicatorError>> {
        let suite = IndicatorSuite::new(self.params)?;
        Ok(IndicatorBundle::compute(&self.raw_data, &self.active_indicators, &suite))
    }

    pub fn derive(&self) -> Result<Derived, Report<IndicatorError>> {
        let bundle = self.bundle()?;
        Ok(Derived {
            indicator_values: bundle.snapshot_values(),
            tri: self
                .raw_data
                .last()
                .and_then(|b| bundle.trend_relative_index(b.close)),
        })
    }

    pub fn verify(&self) -> Result<Verification, Report<IndicatorError>> {
        let derived = self.derive()?;
        let keys: BTreeSet<&String> = self
            .indicator_values
            .keys()
            .chain(derived.indicator_values.keys())
            .collect();

        let mut mismatched: Vec<String> = keys
            .into_iter()
            .filter(|key| {
                match (self.indicator_values.get(*key), derived.indicator_values.get(*key)) {
                    (Some(a), Some(b)) => !same(*a, *b),
                    _ => true,
                }
            })
            .cloned()
            .collect();

        let tri_matches = match (self.tri, derived.tri) {
            (Some(a), Some(b)) => same(a, b),
            (None, None) => true,
            _ => false,
        };
        if !tri_matches {
            mismatched.push("TRI".to_string());
        }
        Ok(Verification { mismatched })
    }

    /// Compact preview of the shipped chart.
    pub fn preview(&self, size: CanvasSize) -> Result<RenderOutput, Report<IndicatorError>> {
        let bundle = self.bundle()?;
        let smoothed = smooth_closes(&self.raw_data, default_window(self.raw_data.len()));
        let view = ChartView {
            status: ChartStatus::Ready,
            bars: &self.raw_data,
            smoothed: &smoothed,
            bundle: &bundle,
            annotations: &[],
            highlight: None,
        };
        Ok(Renderer::compact().render(size, &view))
    }

    pub fn to_json(&self) -> Result<String, Report<OutputError>> {
        serde_json::to_string_pretty(self)
            .change_context(OutputError::Serialize)
            .attach_with(|| format!("snapshot: {}", self.id))
    }
}
