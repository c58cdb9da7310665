use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use crate::error::NotifierError;
use crate::model::Alert;
use crate::notifier::Notifier;

const NOTIFIER_NAME: &str = "discord";
/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts alerts to a Discord-compatible webhook as `{"content": "..."}`.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, Report<NotifierError>> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .change_context(NotifierError::Request {
                notifier: NOTIFIER_NAME.into(),
            })
            .attach("failed to build HTTP client")?;

        Ok(Self {
            client,
            webhook_url: webhook_url.trim().to_owned(),
        })
    }
}

impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        NOTIFIER_NAME
    }

    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), Report<NotifierError>>> {
        Box::pin(async move {
            let content = truncate_content(alert.message());
            let payload = WebhookPayload { content: &content };

            let response = self
                .client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await
                .change_context(NotifierError::Request {
                    notifier: NOTIFIER_NAME.into(),
                })
                .attach_with(|| format!("alert_id: {}", alert.id))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Report::new(NotifierError::Status {
                    notifier: NOTIFIER_NAME.into(),
                    status: status.as_u16(),
                })
                .attach(format!("alert_id: {}", alert.id))
                .attach(format!("response body: {body}")));
            }

            debug!(alert_id = %alert.id, status = status.as_u16(), "webhook accepted alert");
            Ok(())
        })
    }
}

fn truncate_content(mut content: String) -> String {
    if content.chars().count() > MAX_CONTENT_CHARS {
        content = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
        content.push('…');
    }
    content
}
