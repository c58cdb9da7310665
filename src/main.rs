mod change;
mod config;
mod error;
mod model;
mod monitor;
mod notifier;
mod price_source;
mod state;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use monitor::{Monitor, MonitorSettings};
use notifier::Notifier;
use notifier::discord::DiscordNotifier;
use notifier::dispatch::{AlertDispatcher, DEFAULT_QUEUE_CAPACITY};
use notifier::terminal::TerminalNotifier;
use price_source::PriceSource;
use price_source::coingecko::CoinGeckoSource;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("startup error")]
    Startup,
    #[display("could not establish initial prices")]
    Initialize,
}

#[derive(Parser)]
#[command(name = "price-alert", about = "Price change alerts for tracked assets")]
struct Cli {
    /// Path to the configuration file (`.json` or `.toml`)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log alerts to the terminal instead of posting them to the webhook
    #[arg(long)]
    dry_run: bool,

    /// Seed prices, run a single tick, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);
    info!(
        config = %cli.config,
        assets = config.assets.len(),
        currency = %config.vs_currency,
        interval_secs = config.check_interval_seconds,
        "configuration loaded"
    );

    // ── Collaborators ─────────────────────────────────────────────────────────
    let source: Arc<dyn PriceSource> = Arc::new(
        CoinGeckoSource::new(
            &config.api_base_url,
            config.request_timeout(),
            config.requests_per_minute,
        )
        .change_context(AppError::Startup)?,
    );

    let notifier = build_notifier(&config, cli.dry_run)?;
    let dispatcher = AlertDispatcher::spawn(notifier, DEFAULT_QUEUE_CAPACITY);

    // ── Initial prices ────────────────────────────────────────────────────────
    let mut monitor = Monitor::initialize(
        &config,
        MonitorSettings::from_config(&config),
        source,
        dispatcher,
    )
    .await
    .change_context(AppError::Initialize)?;

    if cli.once {
        let report = monitor.tick().await;
        info!(
            fetch_failed = report.fetch_failed,
            alerted = ?report.alerted,
            quiet = ?report.quiet,
            missing = ?report.missing,
            calc_errors = ?report.calc_errors,
            "single tick finished"
        );
        monitor.shutdown().await;
        return Ok(());
    }

    // ── Monitoring loop ───────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel.clone()));

    monitor.run(cancel).await;
    monitor.shutdown().await;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(&config.log_level);
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn build_notifier(config: &Config, dry_run: bool) -> Result<Arc<dyn Notifier>, Report<AppError>> {
    if dry_run {
        info!("dry run: alerts are logged, not posted");
        return Ok(Arc::new(TerminalNotifier));
    }

    let discord = DiscordNotifier::new(&config.discord_webhook_url, config.request_timeout())
        .change_context(AppError::Startup)?;
    Ok(Arc::new(discord))
}

/// Cancel `cancel` on Ctrl-C, or SIGTERM on unix.
async fn wait_for_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl+c received, stopping after the current tick"),
        _ = terminate => info!("SIGTERM received, stopping after the current tick"),
    }
    cancel.cancel();
}
