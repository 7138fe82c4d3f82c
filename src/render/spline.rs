//! Cardinal-style spline paths and gap-aware run splitting.

use super::surface::{DrawCommand, Point};

pub const TENSION: f64 = 0.35;

/// `MoveTo` the first point, then one cubic segment per neighbouring pair.
///
/// Control points come from the neighbours on either side, duplicating the
/// endpoint where a neighbour is missing.
pub fn spline_path(points: &[Point]) -> Vec<DrawCommand> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut path = Vec::with_capacity(points.len());
    path.push(DrawCommand::MoveTo(*first));

    for i in 0..points.len() - 1 {
        let p0 = if i == 0 { points[i] } else { points[i - 1] };
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points.get(i + 2).copied().unwrap_or(p2);
        path.push(DrawCommand::BezierTo {
            c1: Point::new(p1.x + (p2.x - p0.x) * TENSION, p1.y + (p2.y - p0.y) * TENSION),
            c2: Point::new(p2.x - (p3.x - p1.x) * TENSION, p2.y - (p3.y - p1.y) * TENSION),
            to: p2,
        });
    }
    path
}

/// Split an aligned series into contiguous runs of mapped points, breaking at
/// every `None`. Runs of a single point are dropped.
pub fn runs<F>(series: &[Option<f64>], mut map: F) -> Vec<Vec<Point>>
where
    F: FnMut(usize, f64) -> Point,
{
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (i, value) in series.iter().enumerate() {
        match value {
            Some(v) => current.push(map(i, *v)),
            None => {
                if current.len() > 1 {
                    runs.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
        }
    }
    if current.len() > 1 {
        runs.push(current);
    }
    runs
}
