//! Telegram Bot API HTTP client.

use crate::error::TelegramError;
use crate::types::*;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Telegram Bot API client.
///
/// The bot token is part of every request path, so it is kept in a
/// `SecretString` and stripped from transport errors before they surface.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl TelegramClient {
    /// Create a new Telegram client.
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            method
        )
    }

    /// Send a plain-text message to a chat.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let request = SendMessageRequest {
            chat_id,
            text: text.to_string(),
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?;

        let reply: ApiResponse<Message> = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(e) if status.is_success() => return Err(TelegramError::Json(e)),
            Err(_) => {
                warn!(%status, "sendMessage failed with non-JSON body");
                return Err(TelegramError::Api {
                    status: status.as_u16(),
                    description: body,
                });
            }
        };

        match reply.result {
            Some(message) if reply.ok && status.is_success() => {
                debug!(message_id = message.message_id, "Message sent");
                Ok(message)
            }
            _ => {
                let description = reply
                    .description
                    .unwrap_or_else(|| "no description".to_string());
                warn!(%status, %description, "sendMessage rejected");
                Err(TelegramError::Api {
                    status: reply.error_code.unwrap_or(status.as_u16()),
                    description,
                })
            }
        }
    }
}
