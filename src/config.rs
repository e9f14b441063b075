//! Configuration types for pull-progress

use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
    time::Duration,
};

use crate::error::{Error, Result};

/// Environment variable naming the registry endpoint
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 11434;

/// Registry endpoint (scheme, host, port)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryHost {
    /// URL scheme (default: "http")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host name or IP address (default: "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port (default: 11434)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for RegistryHost {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl RegistryHost {
    /// Parse a host value such as `0.0.0.0`, `https://models.local`,
    /// `[::1]:8080` or `"http://10.0.0.2:11434/"`
    ///
    /// Quotes, whitespace and trailing slashes are ignored. Without a port,
    /// `https://` defaults to 443, an explicit `http://` to 80, and a value
    /// without scheme to 11434.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the port is not a valid number.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();

        let (scheme, hostport, default_port) = match value.split_once("://") {
            None => (DEFAULT_SCHEME, value, DEFAULT_PORT),
            Some(("http", rest)) => ("http", rest, 80),
            Some(("https", rest)) => ("https", rest, 443),
            Some((scheme, rest)) => (scheme, rest, DEFAULT_PORT),
        };
        let hostport = hostport.trim_end_matches('/');

        let (host, port) = match split_host_port(hostport) {
            Some((host, port)) => (host.to_string(), Some(port)),
            None => {
                let bare = hostport.trim_start_matches('[').trim_end_matches(']');
                let host = if let Ok(ip) = bare.parse::<IpAddr>() {
                    ip.to_string()
                } else if !hostport.is_empty() {
                    hostport.to_string()
                } else {
                    DEFAULT_HOST.to_string()
                };
                (host, None)
            }
        };

        let port = match port {
            None => default_port,
            Some(port) => port.parse::<u16>().map_err(|_| {
                Error::config(
                    "registry.host",
                    format!("invalid port {port:?} in {HOST_ENV_VAR}"),
                )
            })?,
        };

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            port,
        })
    }

    /// Base URL of the registry API, e.g. `http://127.0.0.1:11434/`
    pub fn base_url(&self) -> Result<url::Url> {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let raw = format!("{}://{}:{}/", self.scheme, host, self.port);
        url::Url::parse(&raw)
            .map_err(|e| Error::config("registry.host", format!("invalid registry URL {raw}: {e}")))
    }
}

impl std::fmt::Display for RegistryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

// Split "host:port" or "[v6]:port"; None when no single port separator exists.
fn split_host_port(value: &str) -> Option<(&str, &str)> {
    if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        return Some((host, port));
    }
    let (host, port) = value.split_once(':')?;
    if port.contains(':') {
        return None;
    }
    Some((host, port))
}

/// Registry transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry endpoint (default: http://127.0.0.1:11434)
    #[serde(default)]
    pub host: RegistryHost,

    /// Connection timeout in seconds (default: 30)
    ///
    /// Only establishing the connection is bounded; a pull stream may run for
    /// hours.
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent sent with pull requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: RegistryHost::default(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Progress tracking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Seconds without progress before an in-flight pull counts as stalled (default: 120)
    #[serde(default = "default_stale_after", with = "duration_serde")]
    pub stale_after: Duration,

    /// Seconds between watchdog sweeps (default: 10)
    #[serde(default = "default_watchdog_interval", with = "duration_serde")]
    pub watchdog_interval: Duration,

    /// Fail and cancel stalled pulls instead of only reporting them (default: false)
    #[serde(default)]
    pub fail_stalled: bool,

    /// Capacity of the broadcast channel for pull events (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
            watchdog_interval: default_watchdog_interval(),
            fail_stalled: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry transport settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Progress tracking settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Override the registry host from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override the registry host using `lookup` as the environment
    ///
    /// An unset or empty variable leaves the configuration untouched. On an
    /// invalid value the configuration is also left untouched and the error is
    /// returned.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let Some(value) = lookup(HOST_ENV_VAR).filter(|v| !v.trim().is_empty()) else {
            return Ok(());
        };
        self.registry.host = RegistryHost::parse(&value)?;
        tracing::debug!(host = %self.registry.host, "registry host taken from environment");
        Ok(())
    }

    /// Check settings that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.tracker.event_channel_capacity == 0 {
            return Err(Error::config(
                "tracker.event_channel_capacity",
                "event channel capacity must be at least 1",
            ));
        }
        if self.tracker.watchdog_interval.is_zero() {
            return Err(Error::config(
                "tracker.watchdog_interval",
                "watchdog interval must be at least 1 second",
            ));
        }
        Ok(())
    }
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("pull-progress/{}", env!("CARGO_PKG_VERSION"))
}

fn default_stale_after() -> Duration {
    Duration::from_secs(120)
}

fn default_watchdog_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
