use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifierError;
use crate::model::Alert;
use crate::notifier::Notifier;

/// Writes alerts to the log instead of delivering them anywhere.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn name(&self) -> &str {
        "terminal"
    }

    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), Report<NotifierError>>> {
        Box::pin(async move {
            tracing::warn!(
                alert_id = %alert.id,
                asset = %alert.asset_id,
                percent_change = alert.percent_change,
                old_price = alert.old_price,
                new_price = alert.new_price,
                threshold = alert.threshold,
                observed_at = %alert.observed_at,
                "ALERT: {}",
                alert.message(),
            );
            Ok(())
        })
    }
}
