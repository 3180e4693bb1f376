//! Connection configuration.
//!
//! A [`StorageConfig`] is resolved by the caller (defaults, TOML file,
//! environment) and handed to [`Client::new`](crate::Client::new). The client
//! never reads process-wide settings on its own.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variables read by [`StorageConfig::from_env`].
pub const ENV_URL: &str = "SIMPLE_STORAGE_URL";
pub const ENV_API_KEY: &str = "SIMPLE_STORAGE_API_KEY";
pub const ENV_TIMEOUT: &str = "SIMPLE_STORAGE_TIMEOUT";
pub const ENV_CONNECT_TIMEOUT: &str = "SIMPLE_STORAGE_CONNECT_TIMEOUT";
pub const ENV_RETRY_TIMES: &str = "SIMPLE_STORAGE_RETRY_TIMES";
pub const ENV_RETRY_SLEEP_MS: &str = "SIMPLE_STORAGE_RETRY_SLEEP_MS";
pub const ENV_VERIFY_SSL: &str = "SIMPLE_STORAGE_VERIFY_SSL";

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Connection parameters for the storage server.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Server base URL, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Empty disables the `Authorization` header.
    #[serde(default)]
    pub api_key: String,

    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// TCP/TLS connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Verify the server's TLS certificate.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

/// Transport-level retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first one fails at the transport level.
    #[serde(default = "default_retry_times")]
    pub times: u32,

    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_retry_sleep_ms")]
    pub sleep_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".into()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_retry_times() -> u32 {
    3
}

fn default_retry_sleep_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: default_retry_times(),
            sleep_ms: default_retry_sleep_ms(),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.times.saturating_add(1)
    }

    /// Pause between two attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry: RetryPolicy::default(),
            verify_ssl: default_true(),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("timeout_ms", &self.timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("retry", &self.retry)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// Placeholder shown instead of a secret in debug output.
fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl StorageConfig {
    /// Creates a config for `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Defaults overlaid with the `SIMPLE_STORAGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Overlays values returned by `lookup` onto `self`.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        // Timeouts are given in seconds in the environment.
        let timeout_secs: Option<u64> = parse_var(&lookup, ENV_TIMEOUT);
        if let Some(secs) = timeout_secs {
            self.timeout_ms = secs.saturating_mul(1000);
        }
        let connect_secs: Option<u64> = parse_var(&lookup, ENV_CONNECT_TIMEOUT);
        if let Some(secs) = connect_secs {
            self.connect_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(v) = parse_var(&lookup, ENV_RETRY_TIMES) {
            self.retry.times = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_RETRY_SLEEP_MS) {
            self.retry.sleep_ms = v;
        }
        if let Some(raw) = lookup(ENV_VERIFY_SSL) {
            match parse_bool(&raw) {
                Some(v) => self.verify_ssl = v,
                None => tracing::warn!(var = ENV_VERIFY_SSL, value = %raw, "ignoring invalid boolean"),
            }
        }
        self.normalized()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(&base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, connect_timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self.connect_timeout_ms = duration_ms(connect_timeout);
        self
    }

    pub fn with_retry(mut self, times: u32, sleep: Duration) -> Self {
        self.retry = RetryPolicy {
            times,
            sleep_ms: duration_ms(sleep),
        };
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn normalized(mut self) -> Self {
        self.base_url = trim_base_url(&self.base_url);
        self
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Strips trailing slashes so paths can be appended with a leading `/`.
pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "ignoring unparseable value");
            None
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
