pub mod file;
pub mod fmp;

use error_stack::{Report, bail};
use futures::future::BoxFuture;
use tracing::warn;

use crate::error::SourceError;
use crate::model::{PriceBar, Timeframe};

/// Where chart bars come from.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn BarSource`).
pub trait BarSource: Send + Sync {
    fn name(&self) -> &str;

    /// Bars for `symbol` over `timeframe`, ascending by date.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>>;
}

/// Reject out-of-order or duplicate dates. Bars breaking the OHLC invariant
/// are logged and kept.
pub fn validate_series(symbol: &str, bars: &[PriceBar]) -> Result<(), Report<SourceError>> {
    if bars.is_empty() {
        bail!(SourceError::Empty {
            symbol: symbol.to_owned(),
        });
    }
    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(Report::new(SourceError::InvalidSeries {
                reason: "dates must be strictly ascending".into(),
            })
            .attach(format!("{} follows {}", pair[1].date, pair[0].date)));
        }
    }

    let inconsistent = bars.iter().filter(|b| !b.is_consistent()).count();
    if inconsistent > 0 {
        warn!(symbol, inconsistent, "bars violate low <= open/close <= high");
    }
    Ok(())
}
