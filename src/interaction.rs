//! Pointer handling: hover tooltip, annotation authoring and resize policy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{Annotation, BoundingBox};
use crate::bundle::ValueRange;
use crate::model::{BarDate, PriceBar, SmoothedPoint};
use crate::render::{CanvasSize, PlotArea, Point};

pub const TOOLTIP_WIDTH: f64 = 120.0;
pub const TOOLTIP_HEIGHT: f64 = 50.0;
const TOOLTIP_OFFSET: f64 = 10.0;

/// Fractional bar index under a pointer `x`, clamped to the series.
pub fn index_at(area: &PlotArea, count: usize, x: f64) -> f64 {
    area.x_fraction(x) * count.saturating_sub(1) as f64
}

/// Nearest bar index under a pointer `x`; `None` without bars.
pub fn nearest_index(area: &PlotArea, count: usize, x: f64) -> Option<usize> {
    if count == 0 {
        return None;
    }
    Some((index_at(area, count, x).round() as usize).min(count - 1))
}

/// Tooltip contents and placement for one pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    pub nearest: usize,
    pub date_label: String,
    /// Linearly interpolated displayed close.
    pub price: f64,
    /// Marker position on the displayed curve.
    pub highlight: Point,
    /// Top-left corner of the tooltip box.
    pub tooltip: Point,
}

impl HoverInfo {
    pub fn price_label(&self) -> String {
        format!("{:.2}", self.price)
    }
}

pub fn hover(
    area: &PlotArea,
    size: CanvasSize,
    smoothed: &[SmoothedPoint],
    price: &ValueRange,
    pointer: Point,
) -> Option<HoverInfo> {
    let nearest = nearest_index(area, smoothed.len(), pointer.x)?;
    let index = index_at(area, smoothed.len(), pointer.x);
    let lower = index.floor() as usize;
    let upper = (lower + 1).min(smoothed.len() - 1);
    let frac = index - lower as f64;
    let interpolated = if upper == lower {
        smoothed[lower].close
    } else {
        smoothed[lower].close + (smoothed[upper].close - smoothed[lower].close) * frac
    };

    Some(HoverInfo {
        nearest,
        date_label: smoothed[nearest].date.tooltip_label(),
        price: interpolated,
        highlight: Point::new(
            area.left + area.x_fraction(pointer.x) * area.width,
            area.y_for(interpolated, price),
        ),
        tooltip: place_tooltip(pointer, size.width),
    })
}

/// Right of and above the pointer; flips left near the right edge and below
/// near the top.
pub fn place_tooltip(pointer: Point, canvas_width: f64) -> Point {
    let mut left = pointer.x + TOOLTIP_OFFSET;
    if left + TOOLTIP_WIDTH > canvas_width {
        left = canvas_width - TOOLTIP_WIDTH - TOOLTIP_OFFSET;
    }
    let mut top = pointer.y - TOOLTIP_HEIGHT - TOOLTIP_OFFSET;
    if top < 0.0 {
        top = pointer.y + TOOLTIP_OFFSET;
    }
    Point::new(left, top)
}

/// Topmost (last drawn) annotation label containing the point. Boxes are
/// index-aligned with the annotations; `None` entries are never hit.
pub fn hit_test(boxes: &[Option<BoundingBox>], point: Point) -> Option<usize> {
    boxes
        .iter()
        .rposition(|b| b.is_some_and(|b| b.contains(point.x, point.y)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthoringState {
    #[default]
    Idle,
    PendingStart(BarDate),
}

/// Result of a pointer press on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// The press hit the label of the annotation at this index.
    Remove(usize),
    StartPending(BarDate),
    Create(Annotation),
    Ignored,
}

/// Two-click percentage line tool.
#[derive(Debug, Clone, Default)]
pub struct Authoring {
    points_mode: bool,
    state: AuthoringState,
}

impl Authoring {
    pub fn points_mode(&self) -> bool {
        self.points_mode
    }

    pub fn state(&self) -> AuthoringState {
        self.state
    }

    /// Switching the tool either way drops a pending start.
    pub fn set_points_mode(&mut self, enabled: bool) {
        self.points_mode = enabled;
        self.state = AuthoringState::Idle;
    }

    pub fn toggle_points_mode(&mut self) -> bool {
        self.set_points_mode(!self.points_mode);
        self.points_mode
    }

    pub fn reset(&mut self) {
        self.state = AuthoringState::Idle;
    }

    /// Label hits win over authoring, in or out of points mode.
    pub fn pointer_down(
        &mut self,
        pointer: Point,
        boxes: &[Option<BoundingBox>],
        area: &PlotArea,
        bars: &[PriceBar],
    ) -> PointerAction {
        if let Some(index) = hit_test(boxes, pointer) {
            return PointerAction::Remove(index);
        }
        if !self.points_mode {
            return PointerAction::Ignored;
        }
        let Some(nearest) = nearest_index(area, bars.len(), pointer.x) else {
            return PointerAction::Ignored;
        };
        let date = bars[nearest].date;

        match self.state {
            AuthoringState::Idle => {
                debug!(%date, "annotation start pending");
                self.state = AuthoringState::PendingStart(date);
                PointerAction::StartPending(date)
            }
            AuthoringState::PendingStart(start) => {
                self.state = AuthoringState::Idle;
                PointerAction::Create(Annotation::new(start, date))
            }
        }
    }
}

/// How the host notifies the chart of size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeStrategy {
    /// Observe the chart's own container.
    #[default]
    #[serde(rename = "observer")]
    ContainerObserver,
    /// Listen for window-level resizes.
    #[serde(rename = "window")]
    WindowListener,
}

impl ResizeStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "observer" => Some(Self::ContainerObserver),
            "window" => Some(Self::WindowListener),
            _ => None,
        }
    }

    /// Falls back to the window listener when the host cannot observe the
    /// container, whatever was preferred.
    pub fn select(preferred: Self, observer_available: bool) -> Self {
        if observer_available { preferred } else { Self::WindowListener }
    }
}
