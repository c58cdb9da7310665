use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::NotifierError;
use crate::model::Alert;
use crate::notifier::Notifier;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hands alerts to a single background worker so a slow or failing
/// notifier never holds up the monitor loop.
///
/// Alerts are delivered one at a time in the order they were queued.
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
    worker: JoinHandle<()>,
}

impl AlertDispatcher {
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Alert>(capacity.max(1));
        let worker = tokio::spawn(delivery_loop(rx, notifier));
        Self { tx, worker }
    }

    /// Queue `alert` for delivery without waiting on the notifier.
    pub fn dispatch(&self, alert: Alert) -> Result<(), Report<NotifierError>> {
        let alert_id = alert.id;
        match self.tx.try_send(alert) {
            Ok(()) => {
                debug!(alert_id = %alert_id, "alert queued");
                Ok(())
            }
            Err(TrySendError::Full(dropped)) => Err(Report::new(NotifierError::QueueFull)
                .attach(format!("dropped alert {} for {}", dropped.id, dropped.asset_id))),
            Err(TrySendError::Closed(dropped)) => Err(Report::new(NotifierError::WorkerGone)
                .attach(format!("dropped alert {} for {}", dropped.id, dropped.asset_id))),
        }
    }

    /// Stop accepting alerts and give the worker up to `grace` to finish
    /// delivering what is already queued.
    pub async fn shutdown(self, grace: Duration) {
        let Self { tx, mut worker } = self;
        drop(tx);

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(Ok(())) => debug!("alert worker drained"),
            Ok(Err(e)) => error!(error = %e, "alert worker panicked"),
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "alert worker did not drain in time, aborting");
                worker.abort();
            }
        }
    }
}

async fn delivery_loop(mut rx: mpsc::Receiver<Alert>, notifier: Arc<dyn Notifier>) {
    while let Some(alert) = rx.recv().await {
        match notifier.notify(&alert).await {
            Ok(()) => info!(
                alert_id = %alert.id,
                asset = %alert.asset_id,
                notifier = notifier.name(),
                "alert delivered"
            ),
            Err(e) => error!(
                alert_id = %alert.id,
                asset = %alert.asset_id,
                notifier = notifier.name(),
                error = ?e,
                "alert delivery failed"
            ),
        }
    }
}
