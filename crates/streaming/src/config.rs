use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// How the client asks the feed for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedMode {
    /// `format=sse`: batches arrive over one long-lived response.
    #[default]
    Incremental,
    /// `format=geojson`: one bounded response, optionally capped.
    Complete { limit: Option<u32> },
}

/// Configuration for a feed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the feed API, without the `/api/v1/events` path.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub mode: FeedMode,

    /// Quiet period before a viewport change turns into a query (ms).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Whole-request timeout handed to the HTTP client. Unset means the
    /// stream may stay open indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            mode: FeedMode::default(),
            debounce_ms: default_debounce_ms(),
            request_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
