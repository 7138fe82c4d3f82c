//! Cosmetic denoising of the displayed price line.
//!
//! This is a centered window that looks ahead as well as behind, so it must
//! not be used where a trailing moving average is meant.

use crate::model::{PriceBar, SmoothedPoint};

/// `max(3, floor(bar_count / 10))`.
pub fn default_window(bar_count: usize) -> usize {
    (bar_count / 10).max(3)
}

/// Mean of closes over `[i - half, i + half]`, clamped to the sequence.
/// A window below 2 passes the closes through unchanged.
pub fn smooth_closes(bars: &[PriceBar], window: usize) -> Vec<SmoothedPoint> {
    if window < 2 {
        return bars
            .iter()
            .map(|b| SmoothedPoint {
                date: b.date,
                close: b.close,
            })
            .collect();
    }

    let half = window / 2;
    let last = bars.len().saturating_sub(1);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let slice = &bars[i.saturating_sub(half)..=(i + half).min(last)];
            let sum: f64 = slice.iter().map(|b| b.close).sum();
            SmoothedPoint {
                date: bar.date,
                close: sum / slice.len() as f64,
            }
        })
        .collect()
}
