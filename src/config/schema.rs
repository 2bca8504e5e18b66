//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatcher.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the outbound dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Manager pool sizing and reclamation.
    pub pool: PoolConfig,

    /// Upstream proxies. Empty means direct connections only.
    pub proxies: Vec<ProxyConfig>,

    /// Per-manager network timeouts.
    pub timeouts: TimeoutConfig,

    /// Defaults applied to every outbound request.
    pub request: RequestConfig,

    /// Credentials answered to server authentication challenges.
    pub auth: AuthConfig,

    /// TLS validation policy.
    pub tls: TlsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Manager pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrently checked-out managers (admission ceiling).
    pub max_concurrent: usize,

    /// A free manager unused for longer than this is reclaimed.
    pub idle_timeout_secs: u64,

    /// Period of the idle reaper.
    pub reap_interval_secs: u64,

    /// Drop pooled connections of a manager every time it is returned.
    pub reset_connections_on_checkin: bool,

    /// Which free manager a checkout picks.
    pub selection: SelectionPolicy,
}

/// Tie-break among free managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Fewest requests served so far; lowest slot wins ties.
    #[default]
    LeastServed,
    /// Oldest `last_used_at`; lowest slot wins ties.
    LeastRecentlyUsed,
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1000,
            idle_timeout_secs: 60,
            reap_interval_secs: 60,
            reset_connections_on_checkin: true,
            selection: SelectionPolicy::LeastServed,
        }
    }
}

/// Proxy protocol spoken to the upstream proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Http,
    Socks5,
}

/// Upstream proxy definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Proxy host name or address.
    pub host: String,

    /// Proxy port.
    pub port: u16,

    /// Proxy protocol (default: http).
    #[serde(default)]
    pub kind: ProxyKind,

    /// Proxy user, if the proxy requires authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Proxy password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Timeout configuration applied to each manager when it is built.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Whole exchange timeout (connect, send, read body) in seconds.
    pub transfer_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            transfer_secs: 10,
        }
    }
}

/// Request defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// User-Agent sent when the caller does not supply one.
    pub user_agent: String,

    /// Headers sent with every request unless the call overrides them.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Server authentication credentials.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// TLS configuration for outbound connections.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Proceed despite certificate validation errors, reporting each one as a warning.
    /// Off unless explicitly enabled.
    pub accept_invalid_certs: bool,

    /// Optional PEM bundle of extra trusted CA certificates.
    pub extra_ca_file: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
