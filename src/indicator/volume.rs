use std::cmp::Ordering;

use crate::indicator::{Indicator, Series};
use crate::model::PriceBar;

/// On-Balance Volume: running volume total signed by close direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Series {
        let mut result = Vec::with_capacity(bars.len());
        let mut total = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                match bar.close.partial_cmp(&bars[i - 1].close) {
                    Some(Ordering::Greater) => total += bar.volume,
                    Some(Ordering::Less) => total -= bar.volume,
                    _ => {}
                }
            }
            result.push(Some(total));
        }
        result
    }
}
