use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const ENV_API_URL: &str = "PCHAT_API_URL";
pub const ENV_WS_URL: &str = "PCHAT_WS_URL";
pub const ENV_VIDEO_WS_URL: &str = "PCHAT_VIDEO_WS_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub api_url: String,
    pub ws_url: String,
    pub video_ws_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub capture_period_ms: u64,
    /// Delay between the channel opening and the first frame.
    pub warmup_ms: u64,
    #[serde(default)]
    pub face_auth: bool,
    #[serde(default = "default_true")]
    pub require_single: bool,
}

impl ValidationSettings {
    pub fn capture_period(&self) -> Duration {
        Duration::from_millis(self.capture_period_ms.max(1))
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub endpoints: EndpointSettings,
    pub validation: ValidationSettings,
    /// Show own messages before the server confirms them.
    #[serde(default)]
    pub optimistic_echo: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoints: EndpointSettings {
                api_url: "http://localhost:8000".into(),
                ws_url: "ws://localhost:8000/ws".into(),
                video_ws_url: "ws://localhost:8000/ws/video".into(),
            },
            validation: ValidationSettings {
                capture_period_ms: 33,
                warmup_ms: 500,
                face_auth: false,
                require_single: true,
            },
            optimistic_echo: false,
        }
    }
}

impl ClientSettings {
    /// Read settings from `path` if it exists, defaults otherwise, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let mut settings = match path {
            Some(p) if p.exists() => {
                let data = std::fs::read_to_string(p)?;
                serde_json::from_str(&data)
                    .map_err(|e| ClientError::Config(format!("{}: {e}", p.display())))?
            }
            _ => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_API_URL) {
            self.endpoints.api_url = url;
        }
        if let Some(url) = non_empty(ENV_WS_URL) {
            self.endpoints.ws_url = url;
        }
        if let Some(url) = non_empty(ENV_VIDEO_WS_URL) {
            self.endpoints.video_ws_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let ep = &self.endpoints;
        if !(ep.api_url.starts_with("http://") || ep.api_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api_url must be http(s): {}",
                ep.api_url
            )));
        }
        for url in [&ep.ws_url, &ep.video_ws_url] {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ClientError::Config(format!("channel url must be ws(s): {url}")));
            }
        }
        if self.validation.capture_period_ms == 0 {
            return Err(ClientError::Config("capture_period_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.endpoints.api_url.trim_end_matches('/')
    }
}
