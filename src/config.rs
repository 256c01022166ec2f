//! Configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String,
    pub db_path: String,
    pub logs_path: PathBuf,
    /// Base URL used when building confirm/cancel links in outgoing mail.
    pub public_url: String,
    pub mail_sender: String,
    pub min_recipient_name_len: usize,
    pub max_recipient_name_len: usize,
    pub captcha_ttl: Duration,
    /// Lifetime of an Ok/Cancel prompt for destructive actions.
    pub confirm_ttl: Duration,
    pub uuid_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: "sqlite://data/cms.db".to_string(),
            db_path: "data/cms.db".to_string(),
            logs_path: PathBuf::from("logs"),
            public_url: "http://localhost".to_string(),
            mail_sender: "no-reply@localhost".to_string(),
            min_recipient_name_len: 1,
            max_recipient_name_len: 64,
            captcha_ttl: Duration::from_secs(300),
            confirm_ttl: Duration::from_secs(300),
            uuid_max_attempts: 8,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides defaults with whatever is set in the environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        if let Some(v) = env_var("DB_URL") {
            self.db_url = v;
        }
        if let Some(v) = env_var("DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = env_var("LOGS_PATH") {
            self.logs_path = PathBuf::from(v);
        }
        if let Some(v) = env_var("PUBLIC_URL") {
            self.public_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env_var("MAIL_SENDER") {
            self.mail_sender = v;
        }
        if let Some(v) = parse_env::<usize>("MIN_RECIPIENT_NAME_LEN")? {
            self.min_recipient_name_len = v;
        }
        if let Some(v) = parse_env::<usize>("MAX_RECIPIENT_NAME_LEN")? {
            self.max_recipient_name_len = v;
        }
        if let Some(v) = parse_env::<u64>("CAPTCHA_TTL_SECS")? {
            self.captcha_ttl = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<u64>("CONFIRM_TTL_SECS")? {
            self.confirm_ttl = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<u32>("UUID_MAX_ATTEMPTS")? {
            self.uuid_max_attempts = v.max(1);
        }

        if self.min_recipient_name_len > self.max_recipient_name_len {
            return Err(AppError::ConfigurationError {
                msg: format!(
                    "MIN_RECIPIENT_NAME_LEN ({}) is greater than MAX_RECIPIENT_NAME_LEN ({})",
                    self.min_recipient_name_len, self.max_recipient_name_len
                ),
            });
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env_var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::InvalidConfig {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}
