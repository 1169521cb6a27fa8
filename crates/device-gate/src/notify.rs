//! Best-effort user notifications over the Bot API.

use async_trait::async_trait;
use telegram_client::TelegramClient;
use tracing::debug;

/// Messages sent to the user's chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Verification succeeded.
    Verified,
    /// A different device tried to use a bound account.
    DeviceChanged,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Notice::Verified => "✅ Network Verified Successfully.\nYou can now use the bot.",
            Notice::DeviceChanged => "⚠️ Device change detected.\nAccess blocked.",
        }
    }
}

/// What happened to a notification. Never turned into a request failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Outbound channel to the user. No retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, chat_id: i64, notice: Notice) -> Delivery;
}

/// Sends notices as private messages from the bot.
#[derive(Clone)]
pub struct TelegramSink {
    client: TelegramClient,
}

impl TelegramSink {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn notify(&self, chat_id: i64, notice: Notice) -> Delivery {
        match self.client.send_message(chat_id, notice.text()).await {
            Ok(message) => {
                debug!(chat_id, ?notice, message_id = message.message_id, "Notice delivered");
                Delivery::Delivered
            }
            Err(e) => Delivery::Failed(e.to_string()),
        }
    }
}
