use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::{Channel, OutboundMessage, Payload};
use crate::config::WebhookConfig;

/// Hands deliveries to an HTTP bot bridge as JSON:
///
/// ```json
/// { "target": "ops-room", "type": "text", "text": "..." }
/// { "target": "ops-room", "type": "image", "image_path": "/.../20240501.jpeg" }
/// ```
pub struct WebhookChannel {
    client: Client,
    url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    target: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_path: Option<String>,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            anyhow::bail!("Webhook URL must start with http:// or https://");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, recipient: &str, msg: &OutboundMessage) -> Result<()> {
        let body = match &msg.payload {
            Payload::Text(text) => WebhookBody {
                target: recipient,
                kind: "text",
                text: Some(text),
                image_path: None,
            },
            Payload::Image(path) => WebhookBody {
                target: recipient,
                kind: "image",
                text: None,
                image_path: Some(path.display().to_string()),
            },
        };

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Webhook request to {} failed", self.url))?;
        if !resp.status().is_success() {
            anyhow::bail!("Webhook error: {} {}", resp.status(), resp.text().await?);
        }
        Ok(())
    }
}
