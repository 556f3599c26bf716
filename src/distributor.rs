use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::channels::{ChannelManager, OutboundMessage};
use crate::fetcher::Digest;
use crate::kind::ContentKind;
use crate::resolver::NewsResolver;

pub const GREETING: &str = "Good morning! Here is today's news digest.\nq(≧▽≦q)";

/// Result of pushing to one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub result: Result<(), String>,
}

impl TargetOutcome {
    pub fn delivered(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Distributor {
    resolver: Arc<NewsResolver>,
    channels: Arc<ChannelManager>,
    throttle: Duration,
}

impl Distributor {
    pub fn new(resolver: Arc<NewsResolver>, channels: Arc<ChannelManager>, throttle: Duration) -> Self {
        Self {
            resolver,
            channels,
            throttle,
        }
    }

    /// Push today's digest to every target in order. One target failing never
    /// stops the others; every target is followed by the throttle delay.
    pub async fn push_to_all(&self, targets: &[String], kind: ContentKind) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.push_one(target, kind).await;
            match &result {
                Ok(()) => tracing::info!("Pushed {kind} news to {target}"),
                Err(e) => tracing::error!("Failed to push news to {target}: {e:#}"),
            }
            outcomes.push(TargetOutcome {
                target: target.clone(),
                result: result.map_err(|e| format!("{e:#}")),
            });
            tokio::time::sleep(self.throttle).await;
        }

        let failed = outcomes.iter().filter(|o| !o.delivered()).count();
        tracing::info!(
            "News push finished: {} delivered, {failed} failed",
            outcomes.len() - failed
        );
        outcomes
    }

    async fn push_one(&self, target: &str, kind: ContentKind) -> Result<()> {
        let resolved = self.resolver.resolve_today(kind).await;
        if let Some(err) = resolved.error {
            anyhow::bail!("news unavailable: {err}");
        }

        match (kind, resolved.content) {
            (ContentKind::Text, Digest::Text(text)) => {
                tracing::debug!("Pushing text news: {}...", text.chars().take(50).collect::<String>());
                self.channels.send(&OutboundMessage::text(target, text)).await
            }
            (ContentKind::Image, Digest::Image(path)) => {
                self.channels.send(&OutboundMessage::text(target, GREETING)).await?;
                self.channels.send(&OutboundMessage::image(target, path)).await
            }
            (kind, other) => anyhow::bail!("resolved {other:?} for {kind} push"),
        }
    }
}
