use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::model::Quote;
use crate::price_source::PriceSource;

const SOURCE_NAME: &str = "coingecko";
const SIMPLE_PRICE_PATH: &str = "/simple/price";

pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl CoinGeckoSource {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, Report<FetchError>> {
        // CoinGecko's public tier allows roughly 30 calls per minute.
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(nonzero!(30u32));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .change_context(FetchError::Request {
                source_name: SOURCE_NAME.into(),
            })
            .attach("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, SIMPLE_PRICE_PATH)
    }
}

impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch<'a>(
        &'a self,
        asset_ids: &'a [String],
        currency: &'a str,
    ) -> BoxFuture<'a, Result<Quote, Report<FetchError>>> {
        Box::pin(async move {
            if asset_ids.is_empty() {
                bail!(FetchError::EmptyRequest);
            }

            self.rate_limiter.until_ready().await;

            let url = self.endpoint();
            let params = vec![
                ("ids", asset_ids.join(",")),
                ("vs_currencies", currency.to_owned()),
            ];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .header("accept", "application/json")
                .send()
                .await
                .change_context(FetchError::Request {
                    source_name: SOURCE_NAME.into(),
                })
                .attach_with(|| format!("url: {url}"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Report::new(FetchError::Status {
                    source_name: SOURCE_NAME.into(),
                    status: status.as_u16(),
                })
                .attach(format!("url: {url}")));
            }

            let body: Value = response
                .json()
                .await
                .change_context(FetchError::ResponseParse {
                    source_name: SOURCE_NAME.into(),
                })?;

            debug!(body = %body, "coingecko simple/price response");

            parse_simple_price(&body, asset_ids, currency)
        })
    }
}

/// Turn a `/simple/price` body into a `Quote`.
///
/// The body must be a JSON object; individual ids that are absent or carry
/// no usable price are dropped rather than failing the whole response.
fn parse_simple_price(
    body: &Value,
    asset_ids: &[String],
    currency: &str,
) -> Result<Quote, Report<FetchError>> {
    let Some(by_asset) = body.as_object() else {
        return Err(Report::new(FetchError::ResponseParse {
            source_name: SOURCE_NAME.into(),
        })
        .attach(format!("expected a JSON object, got: {body}")));
    };

    let mut quote = Quote::new();
    for id in asset_ids {
        let raw = by_asset.get(id).and_then(|prices| prices.get(currency));
        let inserted = match raw.and_then(Value::as_f64) {
            Some(price) => quote.insert(id.clone(), price),
            None => false,
        };
        if !inserted {
            debug!(asset = %id, currency, raw = ?raw, "no usable price in response");
        }
    }

    Ok(quote)
}
