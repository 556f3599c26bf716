use anyhow::Result;

use super::{Channel, OutboundMessage, Payload};

/// Writes deliveries to stdout and the log. Default channel for bare targets.
pub struct LogChannel;

#[async_trait::async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, recipient: &str, msg: &OutboundMessage) -> Result<()> {
        match &msg.payload {
            Payload::Text(text) => {
                tracing::info!("[{recipient}] text message ({} chars)", text.chars().count());
                println!("\n📰 [{recipient}]\n{text}\n");
            }
            Payload::Image(path) => {
                tracing::info!("[{recipient}] image message: {}", path.display());
                println!("\n📰 [{recipient}] image: {}\n", path.display());
            }
        }
        Ok(())
    }
}
