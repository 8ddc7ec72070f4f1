use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Complete console configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Simulation backend connection
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout; unset means rely on the backend's own behaviour
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

fn default_base_url() -> String {
    std::env::var("NDEM_API_URL").unwrap_or_else(|_| "http://localhost:8000/api".to_string())
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Time between fetch-detect-alert cycles (seconds)
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,
}

fn default_poll_interval() -> u64 {
    5
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Close animation length before the next alert is promoted (ms)
    #[serde(default = "default_close_transition")]
    pub close_transition_ms: u64,
    /// Headless presenter: auto-dismiss non-confirm alerts after this long
    #[serde(default = "default_display_seconds")]
    pub display_seconds: u64,
}

fn default_close_transition() -> u64 {
    300
}

fn default_display_seconds() -> u64 {
    8
}

impl AlertConfig {
    pub fn close_transition(&self) -> Duration {
        Duration::from_millis(self.close_transition_ms)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            close_transition_ms: default_close_transition(),
            display_seconds: default_display_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// How long the dispatch confirmation message stays visible (seconds)
    #[serde(default = "default_dispatch_status_clear")]
    pub dispatch_status_clear_seconds: u64,
    /// Delay between a successful reinforcement request and the automatic re-plan (ms)
    #[serde(default = "default_reinforcement_delay")]
    pub reinforcement_delay_ms: u64,
}

fn default_dispatch_status_clear() -> u64 {
    5
}

fn default_reinforcement_delay() -> u64 {
    1500
}

impl WorkflowConfig {
    pub fn dispatch_status_clear(&self) -> Duration {
        Duration::from_secs(self.dispatch_status_clear_seconds)
    }

    pub fn reinforcement_delay(&self) -> Duration {
        Duration::from_millis(self.reinforcement_delay_ms)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dispatch_status_clear_seconds: default_dispatch_status_clear(),
            reinforcement_delay_ms: default_reinforcement_delay(),
        }
    }
}

/// Shared session storage (the cross-view handoff)
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Fixed storage key holding the session snapshot
    #[serde(default = "default_session_key")]
    pub key: String,
    /// How often other writers are checked for (ms)
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ndem_session.db")
}

fn default_session_key() -> String {
    "helpDeskData".to_string()
}

fn default_watch_interval() -> u64 {
    500
}

impl SessionConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(10))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            key: default_session_key(),
            watch_interval_ms: default_watch_interval(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ConsoleConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path))?;
    let config: ConsoleConfig = toml::from_str(&contents).context("Failed to parse config file")?;
    Ok(config)
}
