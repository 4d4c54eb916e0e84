//! Outbound notifications for alert passes.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ENV: &str = "TELEGRAM_CHAT_ID";

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// A channel that delivers alert text.
///
/// `send` reports whether the message was delivered. Failures are logged,
/// never raised, so an alert pass always completes.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, text: &str) -> bool;
}

/// Writes messages to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    /// Always `true`: the log is the destination.
    fn send(&self, text: &str) -> bool {
        tracing::info!(notifier = "log", "{text}");
        true
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API.to_string(),
        })
    }

    /// Read `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`. Blank values count as missing.
    pub fn from_env() -> Result<Self, NotifyError> {
        let read = |key: &'static str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(NotifyError::MissingEnv(key))
        };
        Self::new(read(TOKEN_ENV)?, read(CHAT_ENV)?)
    }

    /// Point at another Bot API host (local test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, text: &str) -> bool {
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });
        let response = match self.client.post(self.endpoint()).json(&body).send() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "telegram request failed");
                return false;
            }
        };
        let status = response.status();
        match response.json::<TelegramResponse>() {
            Ok(r) if status.is_success() && r.ok => {
                tracing::info!(status = status.as_u16(), "telegram message delivered");
                true
            }
            Ok(r) => {
                tracing::warn!(
                    status = status.as_u16(),
                    description = r.description.as_deref().unwrap_or(""),
                    "telegram rejected message"
                );
                false
            }
            Err(e) => {
                tracing::warn!(status = status.as_u16(), error = %e, "unreadable telegram response");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_notifier_always_delivers() {
        assert!(LogNotifier.send("New signals:\nSPY: BUY"));
        assert_eq!(LogNotifier.name(), "log");
    }

    #[test]
    fn endpoint_embeds_token() {
        let n = TelegramNotifier::new("123:abc", "42")
            .unwrap()
            .with_api_base("http://localhost:8081/");
        assert_eq!(n.endpoint(), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn unreachable_host_is_not_delivered() {
        let n = TelegramNotifier::new("t", "c")
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        assert!(!n.send("hello"));
    }

    #[test]
    fn response_parses_ok_flag() {
        let r: TelegramResponse = serde_json::from_str(r#"{"ok":false,"description":"chat not found"}"#).unwrap();
        assert!(!r.ok);
        assert_eq!(r.description.as_deref(), Some("chat not found"));
    }
}
