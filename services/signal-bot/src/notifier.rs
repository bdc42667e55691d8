//! Notifier - best-effort delivery to the messaging channel

use std::sync::Arc;
use tracing::{error, info};

use crate::types::{MessageChannel, ParseMode};

pub struct Notifier {
    channel: Arc<dyn MessageChannel>,
    parse_mode: ParseMode,
}

impl Notifier {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            parse_mode: ParseMode::Markdown,
        }
    }

    /// Send a report. Failures are logged and reported as `false`, never raised.
    pub async fn deliver(&self, report: &str) -> bool {
        match self.channel.send_message(report, self.parse_mode).await {
            Ok(()) => {
                info!(channel = self.channel.channel_id(), "Message sent");
                true
            }
            Err(e) => {
                error!(
                    channel = self.channel.channel_id(),
                    error = %e,
                    "Failed to deliver message"
                );
                false
            }
        }
    }
}
