use std::time::Duration;

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const TIMETRAVEL_BASE: &str = "http://timetravel.mementoweb.org/timemap/json/";
pub const LABS_BASE: &str = "http://labs.mementoweb.org/timemap/json/";

/// Memento aggregator that serves the JSON timemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Aggregator {
    Timetravel,
    Labs,
}

impl Aggregator {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Timetravel => TIMETRAVEL_BASE,
            Self::Labs => LABS_BASE,
        }
    }
}

/// Runtime settings: defaults, then `memento-qa.toml`, then `MEMENTO_QA_*`
/// environment variables. CLI flags are applied on top by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_timemap_base")]
    pub timemap_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Timestamp used when a request names none. Historically the "oldest
    /// date" sentinel; nothing depends on the exact value.
    #[serde(default = "default_date")]
    pub default_date: String,
    /// Subject URL for single-site deployments.
    #[serde(default)]
    pub default_url: Option<String>,
    #[serde(default = "default_true")]
    pub capture_enabled: bool,
    #[serde(default = "default_capture_bin")]
    pub capture_bin: String,
    /// Whitespace-separated arguments; `{output}` and `{url}` are substituted.
    #[serde(default = "default_capture_args")]
    pub capture_args: String,
}

fn default_timemap_base() -> String {
    TIMETRAVEL_BASE.to_string()
}

fn default_user_agent() -> String {
    "memento-qa/0.0.1".to_string()
}

fn default_probe_timeout() -> u64 {
    20
}

fn default_capture_timeout() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    300
}

fn default_concurrency() -> usize {
    8
}

fn default_date() -> String {
    "19000831231300".to_string()
}

fn default_true() -> bool {
    true
}

fn default_capture_bin() -> String {
    "chromium".to_string()
}

fn default_capture_args() -> String {
    "--headless --disable-gpu --hide-scrollbars --window-size=1280,960 --screenshot={output} {url}"
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timemap_base: default_timemap_base(),
            user_agent: default_user_agent(),
            probe_timeout_secs: default_probe_timeout(),
            capture_timeout_secs: default_capture_timeout(),
            request_timeout_secs: default_request_timeout(),
            concurrency: default_concurrency(),
            default_date: default_date(),
            default_url: None,
            capture_enabled: true,
            capture_bin: default_capture_bin(),
            capture_args: default_capture_args(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("memento-qa").required(false))
            .add_source(Environment::with_prefix("MEMENTO_QA").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Worker pool size, never zero.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}
