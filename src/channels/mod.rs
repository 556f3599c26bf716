pub mod log;
pub mod webhook;

use std::path::PathBuf;

use anyhow::Result;

use crate::config::ChannelsConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Image(PathBuf),
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Full target string as configured, e.g. `webhook:ops-room`.
    pub target: String,
    pub payload: Payload,
}

impl OutboundMessage {
    pub fn text(target: &str, text: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            payload: Payload::Text(text.into()),
        }
    }

    pub fn image(target: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            target: target.to_string(),
            payload: Payload::Image(path.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    /// Deliver `msg` to `recipient`, the target with its channel prefix removed.
    async fn send(&self, recipient: &str, msg: &OutboundMessage) -> Result<()>;
}

/// Routes push targets to channels by `channel:` prefix. Targets without a
/// known prefix go to the default channel.
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
    default_channel: String,
}

impl ChannelManager {
    pub fn new(default_channel: &str) -> Self {
        Self {
            channels: Vec::new(),
            default_channel: default_channel.to_string(),
        }
    }

    pub fn from_config(config: &ChannelsConfig) -> Result<Self> {
        let mut mgr = Self::new("log");
        mgr.register(Box::new(log::LogChannel));
        if let Some(wh) = config.webhook.as_ref().filter(|wh| wh.enabled) {
            mgr.register(Box::new(webhook::WebhookChannel::new(wh)?));
            tracing::info!("Channel registered: webhook -> {}", wh.url);
        }
        tracing::debug!("Channels: {}", mgr.names().join(", "));
        Ok(mgr)
    }

    pub fn register(&mut self, channel: Box<dyn Channel>) {
        self.channels.push(channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let (channel_name, recipient) = match msg.target.split_once(':') {
            Some((prefix, rest)) if self.find(prefix).is_some() => (prefix, rest),
            _ => (self.default_channel.as_str(), msg.target.as_str()),
        };
        let channel = self
            .find(channel_name)
            .ok_or_else(|| anyhow::anyhow!("No channel '{channel_name}' for target {}", msg.target))?;
        channel.send(recipient, msg).await
    }

    fn find(&self, name: &str) -> Option<&dyn Channel> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every delivery; fails for recipients listed in `failing`.
    pub struct RecordingChannel {
        pub name: String,
        pub failing: Vec<String>,
        /// Fail only image payloads for these recipients.
        pub failing_images: Vec<String>,
        pub sent: Mutex<Vec<(String, Payload)>>,
    }

    impl RecordingChannel {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                failing: Vec::new(),
                failing_images: Vec::new(),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<(String, Payload)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, recipient: &str, msg: &OutboundMessage) -> Result<()> {
            if self.failing.iter().any(|r| r == recipient) {
                anyhow::bail!("recipient {recipient} unreachable");
            }
            if matches!(msg.payload, Payload::Image(_))
                && self.failing_images.iter().any(|r| r == recipient)
            {
                anyhow::bail!("image upload to {recipient} rejected");
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), msg.payload.clone()));
            Ok(())
        }
    }

    /// Lets a test keep a handle on a channel after registering it.
    pub struct Shared(pub std::sync::Arc<RecordingChannel>);

    #[async_trait::async_trait]
    impl Channel for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn send(&self, recipient: &str, msg: &OutboundMessage) -> Result<()> {
            self.0.send(recipient, msg).await
        }
    }
}
