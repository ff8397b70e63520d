use std::time::Duration;

use axum::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

const API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// An in-app location a notification button can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLink {
    Profile(i64),
    Post(i64),
}

impl DeepLink {
    pub fn start_param(&self) -> String {
        match self {
            DeepLink::Profile(id) => format!("user{id}"),
            DeepLink::Post(id) => format!("p_{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Button {
    pub label: &'static str,
    pub link: DeepLink,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("messaging api rejected send with status {0}")]
    Api(u16),
}

/// Outbound messaging transport. Fire-and-forget: a failed send only affects
/// the one recipient it was addressed to.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        button: Option<&Button>,
    ) -> Result<(), DeliveryError>;
}

/// Production channel speaking the bot messaging HTTP API.
pub struct TelegramChannel {
    http: reqwest::Client,
    token: String,
    bot_username: String,
    app_slug: String,
}

impl TelegramChannel {
    pub fn new(config: &Config) -> Self {
        TelegramChannel {
            http: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .expect("Couldn't build http client"),
            token: config.bot_token.clone(),
            bot_username: config.bot_username.clone(),
            app_slug: config.app_slug.clone(),
        }
    }

    fn link_url(&self, link: &DeepLink) -> String {
        format!(
            "https://t.me/{}/{}?startapp={}",
            self.bot_username,
            self.app_slug,
            link.start_param()
        )
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        button: Option<&Button>,
    ) -> Result<(), DeliveryError> {
        let mut payload = json!({
            "chat_id": recipient,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(button) = button {
            payload["reply_markup"] = json!({
                "inline_keyboard": [[{
                    "text": button.label,
                    "url": self.link_url(&button.link),
                }]],
            });
        }

        let response = self
            .http
            .post(format!("{API_BASE}/bot{}/sendMessage", self.token))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Api(status.as_u16()));
        }
        debug!("delivered message to {recipient}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(&Config {
            bind_addr: String::new(),
            database_url: String::new(),
            bot_token: "123:abc".into(),
            bot_username: "skillnet_bot".into(),
            app_slug: "app".into(),
            backend_url: String::new(),
            upload_dir: PathBuf::new(),
            auth_max_age: None,
        })
    }

    #[test]
    fn deep_link_start_params() {
        assert_eq!(DeepLink::Profile(42).start_param(), "user42");
        assert_eq!(DeepLink::Post(456).start_param(), "p_456");
    }

    #[test]
    fn button_urls_address_the_mini_app() {
        let channel = channel();
        assert_eq!(
            channel.link_url(&DeepLink::Profile(42)),
            "https://t.me/skillnet_bot/app?startapp=user42"
        );
        assert_eq!(
            channel.link_url(&DeepLink::Post(7)),
            "https://t.me/skillnet_bot/app?startapp=p_7"
        );
    }
}
