//! Telegram Bot API client.

mod client;
mod error;
mod types;

pub use client::TelegramClient;
pub use error::TelegramError;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer) -> TelegramClient {
        TelegramClient::new(
            mock_server.uri(),
            SecretString::new("123:abc".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": 42,
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 7, "date": 1700000000 }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let message = client.send_message(42, "hello").await.unwrap();
        assert_eq!(message.message_id, 7);
    }

    #[tokio::test]
    async fn test_send_message_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.send_message(42, "hello").await;

        match result {
            Err(TelegramError::Api {
                status,
                description,
            }) => {
                assert_eq!(status, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_message_ok_false_with_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.send_message(42, "hello").await;
        assert!(matches!(result, Err(TelegramError::Api { status: 200, .. })));
    }

    #[tokio::test]
    async fn test_send_message_plain_text_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.send_message(42, "hello").await;
        assert!(matches!(result, Err(TelegramError::Api { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // Nothing listens on port 9; the connection is refused.
        let client = TelegramClient::new(
            "http://127.0.0.1:9",
            SecretString::new("123:very-secret".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.send_message(42, "hello").await.unwrap_err();
        assert!(matches!(err, TelegramError::Http(_)));
        assert!(!err.to_string().contains("very-secret"));
    }
}
