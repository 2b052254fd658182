use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server origin, without the versioned API suffix.
    pub api_url: String,
    pub request_timeout: Duration,
    pub search_debounce: Duration,
    pub recommended_page_size: u32,
    pub friends_page_size: u32,
    pub incoming_page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::from("http://localhost:8080"),
            request_timeout: Duration::from_secs(30),
            search_debounce: Duration::from_millis(500),
            recommended_page_size: 8,
            friends_page_size: 5,
            incoming_page_size: 6,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        Ok(Self {
            api_url: try_load("STREAMIFY_BASE_API_URL", defaults.api_url)?,
            request_timeout: Duration::from_secs(try_load(
                "STREAMIFY_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            search_debounce: Duration::from_millis(try_load(
                "STREAMIFY_SEARCH_DEBOUNCE_MS",
                defaults.search_debounce.as_millis() as u64,
            )?),
            ..defaults
        })
    }

    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.api_url.trim_end_matches('/'))
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid { key, reason: e.to_string() }
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
