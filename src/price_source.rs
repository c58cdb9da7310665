pub mod coingecko;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::model::Quote;

/// Remote source of spot prices.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn PriceSource`).
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the latest price of every id in `asset_ids`, quoted in `currency`.
    ///
    /// Ids without a valid price are left out of the returned `Quote`. A
    /// transport failure or non-2xx answer fails the whole call.
    fn fetch<'a>(
        &'a self,
        asset_ids: &'a [String],
        currency: &'a str,
    ) -> BoxFuture<'a, Result<Quote, Report<FetchError>>>;
}
