//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "TICTACTOE_API_URL";

/// Path of the game hub below the backend base URL.
pub const HUB_PATH: &str = "/gameHub";

/// Delays before each automatic reconnect attempt, measured from the drop.
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 4] = [0, 2_000, 10_000, 30_000];

/// Number of user-visible notices kept.
pub const DEFAULT_NOTICE_CAPACITY: usize = 5;

/// Automatic reconnect schedule.
///
/// Attempt `n` starts `delays_ms[n]` after the connection dropped. Nothing is
/// tried after the last entry; an empty list turns automatic reconnects off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub delays_ms: Vec<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays_ms: DEFAULT_RECONNECT_DELAYS_MS.to_vec(),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delays_ms: impl Into<Vec<u64>>) -> Self {
        Self {
            delays_ms: delays_ms.into(),
        }
    }

    /// No automatic reconnects.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    pub fn attempts(&self) -> usize {
        self.delays_ms.len()
    }

    /// Offset from the drop for a zero-based attempt.
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        self.delays_ms.get(attempt).copied().map(Duration::from_millis)
    }
}

/// Settings for a [`GameSession`](super::session::GameSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL
    pub api_url: String,

    /// Automatic reconnect schedule
    pub reconnect: ReconnectPolicy,

    /// How many notices to keep
    pub notice_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the base URL taken from `TICTACTOE_API_URL` when set.
    pub fn from_env() -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::default().with_api_url(url.trim()),
            _ => Self::default(),
        }
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    #[must_use]
    pub fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity.max(1);
        self
    }

    /// Full hub endpoint URL.
    pub fn hub_url(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), HUB_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.hub_url(), "http://localhost:5000/gameHub");
        assert_eq!(config.notice_capacity, 5);
        assert_eq!(config.reconnect.attempts(), 4);
    }

    #[test]
    fn test_reconnect_schedule() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Some(Duration::ZERO));
        assert_eq!(policy.delay(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay(2), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay(3), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay(4), None);
        assert_eq!(ReconnectPolicy::disabled().attempts(), 0);
    }

    #[test]
    fn test_hub_url_trailing_slash() {
        let config = ClientConfig::new().with_api_url("https://games.example.com/");
        assert_eq!(config.hub_url(), "https://games.example.com/gameHub");
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(API_URL_ENV, " https://hub.example.com ");
        assert_eq!(
            ClientConfig::from_env().hub_url(),
            "https://hub.example.com/gameHub"
        );

        std::env::set_var(API_URL_ENV, "   ");
        assert_eq!(ClientConfig::from_env().api_url, DEFAULT_API_URL);

        std::env::remove_var(API_URL_ENV);
        assert_eq!(ClientConfig::from_env(), ClientConfig::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ClientConfig::from_json(r#"{"api_url": "http://10.0.0.2:8080", "reconnect": {"delays_ms": [0, 500]}}"#)
                .unwrap();
        assert_eq!(config.api_url, "http://10.0.0.2:8080");
        assert_eq!(config.reconnect, ReconnectPolicy::new([0, 500]));
        assert_eq!(config.notice_capacity, DEFAULT_NOTICE_CAPACITY);
    }

    #[test]
    fn test_notice_capacity_clamped() {
        assert_eq!(ClientConfig::new().with_notice_capacity(0).notice_capacity, 1);
    }
}
