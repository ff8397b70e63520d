use std::path::PathBuf;

use dotenvy::var;
use eyre::Result;

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub bot_token: String,
    pub bot_username: String,
    pub app_slug: String,
    pub backend_url: String,
    pub upload_dir: PathBuf,
    /// Maximum accepted age of a signed payload, in seconds. Unset keeps the
    /// platform's no-expiry behavior.
    pub auth_max_age: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            bind_addr: var("BIND_ADDR").unwrap_or("127.0.0.1:8000".to_string()),
            database_url: var("DATABASE_URL")?,
            bot_token: var("BOT_TOKEN")?,
            bot_username: var("BOT_USERNAME")?,
            app_slug: var("APP_SLUG").unwrap_or("app".to_string()),
            backend_url: var("BACKEND_URL").unwrap_or_default(),
            upload_dir: var("UPLOAD_DIR").unwrap_or("uploads".to_string()).into(),
            auth_max_age: var("AUTH_MAX_AGE_SECS").ok().and_then(|v| v.parse().ok()),
        })
    }
}
