//! User-drawn percentage lines between two bars.

use serde::{Deserialize, Serialize};

use crate::model::{BarDate, PriceBar};

/// A percentage line anchored to two bar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub start: BarDate,
    pub end: BarDate,
}

impl Annotation {
    pub fn new(start: BarDate, end: BarDate) -> Self {
        Self { start, end }
    }

    /// Bar indices of both endpoints, `None` without bars.
    pub fn resolve(&self, bars: &[PriceBar]) -> Option<(usize, usize)> {
        Some((resolve_index(bars, self.start)?, resolve_index(bars, self.end)?))
    }
}

/// Index of the bar at `target`, else the first bar after it, else the last bar.
pub fn resolve_index(bars: &[PriceBar], target: BarDate) -> Option<usize> {
    if bars.is_empty() {
        return None;
    }
    Some(
        bars.iter()
            .position(|b| b.date >= target)
            .unwrap_or(bars.len() - 1),
    )
}

/// `(end - start) / start * 100`, `None` when the start is zero.
pub fn percent_change(start: f64, end: f64) -> Option<f64> {
    if start == 0.0 {
        return None;
    }
    Some((end - start) / start * 100.0)
}

/// Bubble text: `+10.00%`, `-3.25%`, or `n/a` without a defined change.
pub fn change_label(change: Option<f64>) -> String {
    match change {
        Some(pct) if pct >= 0.0 => format!("+{pct:.2}%"),
        Some(pct) => format!("{pct:.2}%"),
        None => "n/a".to_string(),
    }
}

/// Axis-aligned screen-space box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounds of a `width` x `height` rectangle centered at `(cx, cy)` and
    /// rotated by `angle` radians.
    pub fn of_rotated_rect(cx: f64, cy: f64, width: f64, height: f64, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let (w2, h2) = (width / 2.0, height / 2.0);
        let corners = [(-w2, -h2), (w2, -h2), (w2, h2), (-w2, h2)];

        let mut bbox = Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            let gx = cx + x * cos - y * sin;
            let gy = cy + x * sin + y * cos;
            bbox.min_x = bbox.min_x.min(gx);
            bbox.max_x = bbox.max_x.max(gx);
            bbox.min_y = bbox.min_y.min(gy);
            bbox.max_y = bbox.max_y.max(gy);
        }
        bbox
    }

    /// Inclusive on every edge.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::{bar, bars_from_closes};

    #[test]
    fn resolves_exact_then_following_then_last() {
        let bars = vec![
            bar(0, 1.0, 1.0, 1.0, 1.0, 1.0),
            bar(2, 1.0, 1.0, 1.0, 1.0, 1.0),
            bar(4, 1.0, 1.0, 1.0, 1.0, 1.0),
        ];
        assert_eq!(resolve_index(&bars, bars[1].date), Some(1));
        // day 3 falls between day 2 and day 4
        assert_eq!(resolve_index(&bars, bar(3, 0.0, 0.0, 0.0, 0.0, 0.0).date), Some(2));
        assert_eq!(resolve_index(&bars, bar(9, 0.0, 0.0, 0.0, 0.0, 0.0).date), Some(2));
        assert_eq!(resolve_index(&[], bars[0].date), None);
    }

    #[test]
    fn ten_percent_rise_label() {
        let mut closes = vec![100.0; 11];
        closes[10] = 110.0;
        let bars = bars_from_closes(&closes);
        let annotation = Annotation::new(bars[0].date, bars[10].date);
        let (s, e) = annotation.resolve(&bars).unwrap();
        let label = change_label(percent_change(bars[s].close, bars[e].close));
        assert_eq!(label, "+10.00%");
    }

    #[test]
    fn negative_and_undefined_labels() {
        assert_eq!(change_label(percent_change(200.0, 150.0)), "-25.00%");
        assert_eq!(change_label(percent_change(0.0, 5.0)), "n/a");
        assert_eq!(change_label(Some(0.0)), "+0.00%");
    }

    #[test]
    fn unrotated_box_matches_rect() {
        let bbox = BoundingBox::of_rotated_rect(50.0, 20.0, 40.0, 18.0, 0.0);
        assert!((bbox.min_x - 30.0).abs() < 1e-9);
        assert!((bbox.max_x - 70.0).abs() < 1e-9);
        assert!((bbox.min_y - 11.0).abs() < 1e-9);
        assert!((bbox.max_y - 29.0).abs() < 1e-9);
        assert!(bbox.contains(30.0, 11.0));
        assert!(!bbox.contains(71.0, 20.0));
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let bbox =
            BoundingBox::of_rotated_rect(0.0, 0.0, 40.0, 18.0, std::f64::consts::FRAC_PI_2);
        assert!((bbox.max_x - 9.0).abs() < 1e-9);
        assert!((bbox.max_y - 20.0).abs() < 1e-9);
    }
}
