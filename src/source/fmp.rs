use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::model::{PriceBar, Timeframe};
use crate::source::{BarSource, validate_series};

const PROVIDER: &str = "fmp";
pub const FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

/// Financial Modeling Prep REST source.
pub struct FmpSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl FmpSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Endpoint URL and query parameters (without the API key) for one load.
    ///
    /// `1D`/`1W` use 5- and 30-minute intraday bars; the rest use daily bars
    /// limited by session count, or by date range for `YTD`.
    pub fn request(&self, symbol: &str, timeframe: Timeframe, today: NaiveDate) -> (String, Vec<(&'static str, String)>) {
        let intraday = |interval: &str| format!("{}/historical-chart/{interval}/{symbol}", self.base_url);
        let daily = format!("{}/historical-price-full/{symbol}", self.base_url);
        let sessions = |n: u32| vec![("timeseries", n.to_string())];

        match timeframe {
            Timeframe::OneDay => (intraday("5min"), Vec::new()),
            Timeframe::OneWeek => (intraday("30min"), Vec::new()),
            Timeframe::OneMonth => (daily, sessions(22)),
            Timeframe::ThreeMonths => (daily, sessions(66)),
            Timeframe::SixMonths => (daily, sessions(132)),
            Timeframe::OneYear => (daily, sessions(252)),
            Timeframe::FiveYears => (daily, sessions(1260)),
            Timeframe::YearToDate => (
                daily,
                vec![
                    ("from", format!("{}-01-01", today.year())),
                    ("to", today.format("%Y-%m-%d").to_string()),
                ],
            ),
        }
    }
}

/// Intraday endpoints return a bare array; daily ones wrap it in `historical`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FmpPayload {
    Intraday(Vec<PriceBar>),
    Daily {
        #[serde(default)]
        historical: Vec<PriceBar>,
    },
}

/// Oldest first; `1D` keeps only the most recent session.
fn into_bars(payload: FmpPayload, timeframe: Timeframe) -> Vec<PriceBar> {
    let mut bars = match payload {
        FmpPayload::Intraday(bars) => bars,
        FmpPayload::Daily { historical } => historical,
    };
    bars.reverse();

    if timeframe == Timeframe::OneDay {
        if let Some(last) = bars.last().map(|b| b.date.date()) {
            bars.retain(|b| b.date.date() == last);
        }
    }
    bars
}

impl BarSource for FmpSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>> {
        let symbol = symbol.to_uppercase();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let (url, mut params) = self.request(&symbol, timeframe, Utc::now().date_naive());
            debug!(url = %url, timeframe = %timeframe, "fmp request");
            params.push(("apikey", self.api_key.clone()));

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(SourceError::Request {
                    provider: PROVIDER.into(),
                })?;

            if !response.status().is_success() {
                return Err(Report::new(SourceError::Request {
                    provider: PROVIDER.into(),
                })
                .attach(format!("HTTP status: {}", response.status())));
            }

            let payload: FmpPayload = response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    provider: PROVIDER.into(),
                })?;

            let bars = into_bars(payload, timeframe);
            validate_series(&symbol, &bars)?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                fetched = bars.len(),
                "fmp bar fetch complete"
            );
            Ok(bars)
        })
    }
}
