use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change;
use crate::config::Config;
use crate::error::{FetchError, MonitorError};
use crate::model::{Alert, Quote, format_price};
use crate::notifier::dispatch::AlertDispatcher;
use crate::price_source::PriceSource;
use crate::state::AssetBook;

const NOTIFIER_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub currency: String,
    pub poll_interval: Duration,
    /// Upper bound on one fetch, rate-limit wait included.
    pub fetch_deadline: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            currency: config.vs_currency.clone(),
            poll_interval: config.poll_interval(),
            fetch_deadline: config.poll_interval(),
        }
    }
}

/// What happened to each asset during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub fetch_failed: bool,
    pub alerted: Vec<String>,
    pub quiet: Vec<String>,
    pub missing: Vec<String>,
    pub calc_errors: Vec<String>,
}

/// Polls the price source on a fixed interval and alerts on large moves.
///
/// A `Monitor` only exists once every asset has a baseline; `run` drives it
/// until cancelled and `shutdown` drains outstanding alerts.
pub struct Monitor {
    source: Arc<dyn PriceSource>,
    alerts: AlertDispatcher,
    settings: MonitorSettings,
    asset_ids: Vec<String>,
    book: AssetBook,
}

impl Monitor {
    /// Fetch the first price of every configured asset in a single request
    /// and seed the baselines.
    pub async fn initialize(
        config: &Config,
        settings: MonitorSettings,
        source: Arc<dyn PriceSource>,
        alerts: AlertDispatcher,
    ) -> Result<Self, Report<MonitorError>> {
        let asset_ids = config.asset_ids();
        info!(
            assets = ?asset_ids,
            currency = %settings.currency,
            source = source.name(),
            "fetching initial prices"
        );

        let quote = fetch_with_deadline(source.as_ref(), &asset_ids, &settings)
            .await
            .change_context(MonitorError::InitialFetch)
            .attach_with(|| format!("assets: {}", asset_ids.join(", ")))
            .attach("check network access and api_base_url, then restart")?;

        let book = AssetBook::seed(&config.assets, &quote)?;

        info!(tracked = book.len(), "baselines seeded");
        for id in &asset_ids {
            if let Some(state) = book.get(id) {
                info!(
                    asset = %id,
                    price = state.last_price(),
                    threshold = state.threshold(),
                    "initial price"
                );
            }
        }

        Ok(Self {
            source,
            alerts,
            settings,
            asset_ids,
            book,
        })
    }

    pub fn book(&self) -> &AssetBook {
        &self.book
    }

    /// Sleep, fetch, evaluate; repeat until `cancel` fires.
    ///
    /// Cancellation is only observed between ticks, so a tick that has
    /// started always evaluates every asset.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            assets = ?self.book.ids(),
            interval_secs = self.settings.poll_interval.as_secs_f64(),
            "monitoring started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            self.tick().await;
        }

        info!("monitoring stopped");
    }

    /// Run one fetch-evaluate-notify cycle.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let quote = match fetch_with_deadline(self.source.as_ref(), &self.asset_ids, &self.settings)
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                error!(error = ?e, "could not fetch prices, skipping tick");
                report.fetch_failed = true;
                return report;
            }
        };

        if quote.is_empty() {
            warn!("price source returned no usable prices this tick");
        }

        self.evaluate(&quote, &mut report);

        debug!(
            prices = quote.len(),
            alerted = report.alerted.len(),
            quiet = report.quiet.len(),
            missing = report.missing.len(),
            calc_errors = report.calc_errors.len(),
            "tick complete"
        );
        report
    }

    fn evaluate(&mut self, quote: &Quote, report: &mut TickReport) {
        for state in self.book.iter_mut() {
            let asset = state.id().to_owned();
            let Some(new_price) = quote.get(&asset) else {
                warn!(asset = %asset, last_price = state.last_price(), "no price this tick, skipping");
                report.missing.push(asset);
                continue;
            };

            let old_price = state.last_price();
            match change::evaluate(&asset, old_price, new_price, state.threshold()) {
                // A zero baseline never passes validation; a subnormal one can
                // still overflow the ratio.
                Err(e) => {
                    error!(asset = %asset, old_price, new_price, "calculation error: {e}");
                    report.calc_errors.push(asset.clone());
                }
                Ok(result) if result.exceeded => {
                    warn!(
                        asset = %asset,
                        old_price,
                        new_price,
                        threshold = state.threshold(),
                        "THRESHOLD EXCEEDED! change: {:+.2}%",
                        result.percent_change,
                    );
                    let alert = Alert::from_change(
                        &result,
                        state.threshold(),
                        &self.settings.currency,
                        self.settings.poll_interval,
                    );
                    if let Err(e) = self.alerts.dispatch(alert) {
                        error!(asset = %asset, error = ?e, "alert not queued");
                    }
                    report.alerted.push(asset.clone());
                }
                Ok(result) => {
                    info!(
                        asset = %asset,
                        price = new_price,
                        "price {} | change {:+.2}% (no alert)",
                        format_price(new_price),
                        result.percent_change,
                    );
                    report.quiet.push(asset.clone());
                }
            }

            if !state.advance(new_price) {
                error!(asset = %asset, new_price, "rejected invalid price, baseline unchanged");
            }
        }
    }

    /// Stop the alert worker, letting queued alerts drain briefly.
    pub async fn shutdown(self) {
        self.alerts.shutdown(NOTIFIER_DRAIN_GRACE).await;
    }
}

async fn fetch_with_deadline(
    source: &dyn PriceSource,
    asset_ids: &[String],
    settings: &MonitorSettings,
) -> Result<Quote, Report<FetchError>> {
    match tokio::time::timeout(
        settings.fetch_deadline,
        source.fetch(asset_ids, &settings.currency),
    )
    .await
    {
        Ok(result) => result,
        Err(elapsed) => Err(Report::new(elapsed).change_context(FetchError::Timeout {
            source_name: source.name().to_owned(),
        })),
    }
}
