//! Telegram delivery and the message bodies sent for each run outcome.

use log::{error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{Config, TelegramConfig};
use crate::utils::RenewError;

/// Manual renewal instructions appended to reminders and errors.
pub const RENEW_GUIDE_HTML: &str = "\
📝 <b>How to renew manually:</b>
1. Log in to the <a href=\"https://dashboard.katabump.com/\">Dashboard</a>
2. Open <b>Your Servers</b> in the menu
3. Click <b>See</b> next to the server
4. Go to the <b>General</b> tab
5. Press the blue <b>Renew</b> button

🔗 <a href=\"https://dashboard.katabump.com/\">Open the login page</a>";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug)]
pub enum NotificationError {
    NotConfigured,
    Reqwest(reqwest::Error),
    Rejected(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Reqwest(err)
    }
}

impl std::fmt::Display for NotificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationError::NotConfigured => write!(f, "TG_BOT_TOKEN or TG_CHAT_ID not set"),
            NotificationError::Reqwest(e) => write!(f, "Telegram request failed: {}", e),
            NotificationError::Rejected(reason) => write!(f, "Telegram rejected the message: {}", reason),
        }
    }
}

impl std::error::Error for NotificationError {}

/// Sends HTML messages through the Telegram bot API. Delivery problems are logged, never returned.
pub struct Notifier {
    client: Client,
    telegram: TelegramConfig,
}

impl Notifier {
    pub fn new(config: &Config) -> Notifier {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Notifier { client, telegram: config.telegram.clone() }
    }

    /// Returns whether the message was delivered.
    pub async fn notify(&self, text: &str) -> bool {
        match self.send(text).await {
            Ok(()) => {
                info!("Telegram notification sent");
                true
            }
            Err(NotificationError::NotConfigured) => {
                warn!("Telegram not configured, skipping notification");
                false
            }
            Err(e) => {
                error!("Telegram error: {}", e);
                false
            }
        }
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let (Some(token), Some(chat_id)) = (&self.telegram.bot_token, &self.telegram.chat_id) else {
            return Err(NotificationError::NotConfigured);
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.telegram.api_url.as_str().trim_end_matches('/'),
            token
        );
        let payload = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = match response.json::<SendMessageResponse>().await {
            Ok(body) if !body.ok => body.description.unwrap_or_else(|| status.to_string()),
            _ => status.to_string(),
        };
        Err(NotificationError::Rejected(reason))
    }
}

/// Reminder sent while the dashboard refuses renewal and expiry is close.
pub fn reminder_message(
    config: &Config,
    expiry: &str,
    days_left: i64,
    renew_error: &RenewError,
) -> String {
    let message = escape_html(&renew_error.message);
    let status = match &renew_error.available_on {
        Some(date) => format!("{} (renewable from {})", message, escape_html(date)),
        None => message,
    };
    format!(
        "ℹ️ <b>KataBump renewal reminder</b>\n\n\
         🖥 Server: <code>{}</code>\n\
         📅 Expiry: {}\n\
         ⏰ Remaining: {} days\n\
         📝 Status: {}\n\
         💻 Executor: {}\n\n\
         {}",
        config.server_id, expiry, days_left, status, config.executor_name, RENEW_GUIDE_HTML
    )
}

pub fn success_message(config: &Config, old_expiry: &str, new_expiry: &str) -> String {
    format!(
        "✅ <b>KataBump renewal succeeded</b>\n\n\
         🖥 Server: <code>{}</code>\n\
         📅 Previous expiry: {}\n\
         📅 New expiry: {}\n\
         💻 Executor: {}",
        config.server_id, old_expiry, new_expiry, config.executor_name
    )
}

/// Sent when the renewal request went through but the expiry did not move.
pub fn check_status_message(config: &Config, expiry: &str) -> String {
    format!(
        "⚠️ <b>KataBump: please check renewal status</b>\n\n\
         🖥 Server: <code>{}</code>\n\
         📅 Expiry: {}\n\
         💻 Executor: {}\n\n\
         {}",
        config.server_id, expiry, config.executor_name, RENEW_GUIDE_HTML
    )
}

pub fn error_message(config: &Config, err: &dyn std::fmt::Display) -> String {
    let err = escape_html(&err.to_string());
    format!(
        "❌ <b>KataBump run failed</b>\n\n\
         🖥 Server: <code>{}</code>\n\
         ❗ Error: {}\n\
         💻 Executor: {}\n\n\
         {}",
        config.server_id, err, config.executor_name, RENEW_GUIDE_HTML
    )
}

/// Escapes text interpolated into an HTML-mode message.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;

    fn config(bot_token: Option<&str>) -> Config {
        Config {
            dashboard_url: Url::parse("https://dash.example").unwrap(),
            server_id: "5".to_string(),
            email: "me@example.com".to_string(),
            password: "pw".to_string(),
            executor_name: "cron".to_string(),
            proxy: None,
            timeout: Duration::from_secs(5),
            telegram: TelegramConfig {
                api_url: Url::parse("http://127.0.0.1:9").unwrap(),
                bot_token: bot_token.map(str::to_string),
                chat_id: Some("42".to_string()),
            },
        }
    }

    #[test]
    fn success_message_mentions_both_dates() {
        let text = success_message(&config(None), "2025-03-14", "2025-04-14");
        assert!(text.contains("<code>5</code>"));
        assert!(text.contains("2025-03-14"));
        assert!(text.contains("2025-04-14"));
        assert!(text.contains("cron"));
        assert!(!text.contains(RENEW_GUIDE_HTML));
    }

    #[test]
    fn reminder_and_error_carry_the_guide() {
        let cfg = config(None);
        let too_early = RenewError { message: "too early".to_string(), available_on: None };
        assert!(reminder_message(&cfg, "2025-03-14", 1, &too_early).ends_with(RENEW_GUIDE_HTML));
        assert!(check_status_message(&cfg, "2025-03-14").ends_with(RENEW_GUIDE_HTML));
        assert!(error_message(&cfg, &"boom").ends_with(RENEW_GUIDE_HTML));
    }

    #[test]
    fn reminder_names_the_renewal_date() {
        let blocked = RenewError {
            message: "You can renew as of 14 March".to_string(),
            available_on: Some("March 14".to_string()),
        };
        let text = reminder_message(&config(None), "2025-03-15", 1, &blocked);
        assert!(text.contains("📝 Status: You can renew as of 14 March (renewable from March 14)"));

        let undated = RenewError { message: "Too early".to_string(), available_on: None };
        let text = reminder_message(&config(None), "2025-03-15", 1, &undated);
        assert!(text.contains("📝 Status: Too early\n"));
        assert!(!text.contains("renewable from"));
    }

    #[test]
    fn error_text_is_escaped() {
        let text = error_message(&config(None), &"bad <input> & more");
        assert!(text.contains("bad &lt;input&gt; &amp; more"));
    }

    #[test]
    fn payload_shape() {
        let payload = SendMessageRequest {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "chat_id": "42",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            })
        );
    }

    #[tokio::test]
    async fn unconfigured_notifier_does_not_send() {
        let notifier = Notifier::new(&config(None));
        assert!(!notifier.notify("hello").await);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        // Nothing listens on the discard port.
        let notifier = Notifier::new(&config(Some("token")));
        assert!(!notifier.notify("hello").await);
    }
}
