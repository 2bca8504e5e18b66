//! Upstream proxy descriptors.

use std::fmt;

use crate::auth::Credentials;
use crate::config::{ProxyConfig, ProxyKind};

/// One upstream proxy a manager can be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxyDescriptor {
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProxyKind::Http,
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// `host:port`, as shown in failure messages. IPv6 literals are bracketed.
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Proxy URL understood by the HTTP client.
    pub fn url(&self) -> String {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
        };
        format!("{}://{}", scheme, self.endpoint())
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl From<&ProxyConfig> for ProxyDescriptor {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            kind: config.kind,
            host: config.host.clone(),
            port: config.port,
            credentials: Credentials::from_parts(config.username.as_deref(), config.password.as_deref()),
        }
    }
}
