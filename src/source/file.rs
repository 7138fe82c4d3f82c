use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tracing::info;

use crate::error::SourceError;
use crate::model::{PriceBar, Timeframe};
use crate::source::{BarSource, validate_series};

const PROVIDER: &str = "file";

/// Reads `<data_dir>/<SYMBOL>_<timeframe>.json`, a JSON array of bars in feed
/// format.
pub struct FileSource {
    data_dir: PathBuf,
}

impl FileSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.json", symbol.to_uppercase(), timeframe))
    }
}

impl BarSource for FileSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let path = self.path_for(&symbol, timeframe);
            let content = tokio::fs::read_to_string(&path)
                .await
                .change_context(SourceError::Read {
                    provider: PROVIDER.into(),
                })
                .attach_with(|| format!("path: {}", path.display()))?;

            let bars: Vec<PriceBar> = serde_json::from_str(&content)
                .change_context(SourceError::ResponseParse {
                    provider: PROVIDER.into(),
                })
                .attach_with(|| format!("path: {}", path.display()))?;

            validate_series(&symbol, &bars)?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                bars = bars.len(),
                "file bar load complete"
            );
            Ok(bars)
        })
    }
}
