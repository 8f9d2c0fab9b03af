//! Telegram Bot API client.
//!
//! Provides:
//! - `sendMessage`: outbound text delivery (the [`MessageTransport`] seam)
//! - `getUpdates`: long polling for inbound commands
//!
//! The client is constructed once and passed to whoever needs it. There is
//! no process-wide bot handle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::events::{BotCommand, CommandRequest, RecipientId};

use super::auth::BotCredentials;

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Server-side wait for `getUpdates`.
const LONG_POLL_SECS: u64 = 25;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after: {0}s")]
    RateLimited(u64),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// "Send text to recipient" capability.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<(), DeliveryError>;
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    credentials: BotCredentials,
}

impl TelegramClient {
    /// Creates a client against the public Bot API.
    pub fn new(credentials: BotCredentials) -> Result<Self, DeliveryError> {
        Self::with_api_url(credentials, DEFAULT_API_URL.to_string())
    }

    /// Creates a client against a custom Bot API server.
    pub fn with_api_url(
        credentials: BotCredentials,
        api_url: String,
    ) -> Result<Self, DeliveryError> {
        // Must outlast the long-poll window or every idle poll times out.
        let client = Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.credentials.bot_token, method)
    }

    /// Long-polls for updates newer than `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, DeliveryError> {
        let mut query = vec![("timeout", LONG_POLL_SECS.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_api_response(status, &body)
    }

    /// Looks up the bot's own account, used to recognize addressed commands.
    pub async fn get_me(&self) -> Result<BotUser, DeliveryError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;

        let status = response.status();
        let body = response.text().await?;
        parse_api_response(status, &body)
    }

    /// Returns the API base URL (without the token).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: recipient.as_str(),
            text,
            disable_web_page_preview: true,
        };

        debug!("[telegram] sendMessage to {}", recipient);

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_api_response::<serde_json::Value>(status, &body).map(|_| ())
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

// ============ Wire Types ============

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// A raw update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// The bot's own account, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

// ============ Helper Functions ============

/// Unwraps a Bot API envelope, classifying failures.
fn parse_api_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, DeliveryError> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(DeliveryError::ParseError(e.to_string())),
        Err(_) => {
            return Err(DeliveryError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            })
        }
    };

    if envelope.ok && status.is_success() {
        return envelope
            .result
            .ok_or_else(|| DeliveryError::ParseError("Response missing result".to_string()));
    }

    let code = envelope.error_code.unwrap_or_else(|| status.as_u16());
    if code == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        let retry_after = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(1);
        return Err(DeliveryError::RateLimited(retry_after));
    }

    Err(DeliveryError::ApiError {
        status: code,
        message: envelope.description.unwrap_or_default(),
    })
}

/// Converts a raw update into a command request, if it carries one
/// meant for this bot.
pub fn normalize_update(update: &Update, bot_username: Option<&str>) -> Option<CommandRequest> {
    let message = update.message.as_ref()?;
    let command = BotCommand::parse(message.text.as_deref()?, bot_username)?;

    Some(CommandRequest {
        recipient: RecipientId::from(message.chat.id),
        command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_response_ok() {
        let body = r#"{"ok": true, "result": {"message_id": 7}}"#;
        let value: serde_json::Value = parse_api_response(StatusCode::OK, body).unwrap();
        assert_eq!(value["message_id"], 7);
    }

    #[test]
    fn test_parse_api_response_rejected_chat() {
        let body = r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#;
        let err = parse_api_response::<serde_json::Value>(StatusCode::FORBIDDEN, body).unwrap_err();
        match err {
            DeliveryError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_api_response_rate_limited() {
        let body = r#"{"ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": {"retry_after": 12}}"#;
        let err = parse_api_response::<serde_json::Value>(StatusCode::TOO_MANY_REQUESTS, body)
            .unwrap_err();
        assert!(matches!(err, DeliveryError::RateLimited(12)));
    }

    #[test]
    fn test_parse_api_response_non_json_error() {
        let err =
            parse_api_response::<serde_json::Value>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, DeliveryError::ApiError { status: 502, .. }));
    }

    #[test]
    fn test_parse_updates() {
        let body = r#"{"ok": true, "result": [
            {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"}, "text": "/start"}},
            {"update_id": 11, "edited_message": {"message_id": 2}}
        ]}"#;
        let updates: Vec<Update> = parse_api_response(StatusCode::OK, body).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].update_id, 10);
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_normalize_update() {
        let update = Update {
            update_id: 1,
            message: Some(IncomingMessage {
                chat: Chat { id: 42 },
                text: Some("/stop".to_string()),
            }),
        };
        let request = normalize_update(&update, Some("TradeAlertBot")).unwrap();
        assert_eq!(request.recipient, RecipientId::new("42"));
        assert_eq!(request.command, BotCommand::Stop);

        let chatter = Update {
            update_id: 2,
            message: Some(IncomingMessage {
                chat: Chat { id: 42 },
                text: Some("hello".to_string()),
            }),
        };
        assert!(normalize_update(&chatter, Some("TradeAlertBot")).is_none());
    }

    #[test]
    fn test_normalize_update_ignores_other_bots_commands() {
        let group = |text: &str| Update {
            update_id: 3,
            message: Some(IncomingMessage {
                chat: Chat { id: -100500 },
                text: Some(text.to_string()),
            }),
        };

        assert!(normalize_update(&group("/start@OtherBot"), Some("TradeAlertBot")).is_none());
        let request =
            normalize_update(&group("/start@TradeAlertBot"), Some("TradeAlertBot")).unwrap();
        assert_eq!(request.recipient, RecipientId::new("-100500"));
        assert_eq!(request.command, BotCommand::Start);
    }

    #[test]
    fn test_parse_get_me() {
        let body = r#"{"ok": true, "result": {"id": 7, "is_bot": true, "username": "TradeAlertBot"}}"#;
        let me: BotUser = parse_api_response(StatusCode::OK, body).unwrap();
        assert_eq!(me.id, 7);
        assert_eq!(me.username.as_deref(), Some("TradeAlertBot"));
    }

    #[test]
    fn test_method_url_and_debug_hide_token() {
        let client = TelegramClient::with_api_url(
            BotCredentials::new("123:abc".to_string(), None),
            "http://localhost:8081/".to_string(),
        )
        .unwrap();
        assert_eq!(client.method_url("getMe"), "http://localhost:8081/bot123:abc/getMe");
        assert!(!format!("{:?}", client).contains("123:abc"));
    }
}
