pub mod discord;
pub mod dispatch;
pub mod terminal;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifierError;
use crate::model::Alert;

/// Sink for alert notifications.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), Report<NotifierError>>>;
}
