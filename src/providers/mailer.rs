/// Mail delivery collaborators
///
/// `WebhookMailer` posts the message to a configured HTTP endpoint (a
/// transactional-mail relay or internal service); `LogMailer` is the
/// default when no endpoint is configured and simply records the send.

use async_trait::async_trait;
use serde_json::json;

use super::Mailer;

/// Posts `{to, subject, body}` as JSON to an HTTP relay endpoint.
pub struct WebhookMailer {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookMailer {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({"to": to, "subject": subject, "body": body}))
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("mail relay returned status {}", response.status());
        }
        tracing::info!("📧 Mail relayed to '{}' via {}", to, self.endpoint);
        Ok(())
    }
}

/// No-delivery fallback that logs the message instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!("📧 (log mailer) to='{}' subject='{}'", to, subject);
        Ok(())
    }
}
