//! reqwest-backed managers.
//!
//! # Responsibilities
//! - Build one client per manager, bound to at most one proxy
//! - Apply connect/transfer timeouts and the TLS policy at build time
//! - Answer a Basic challenge once through the auth bridge
//! - Turn responses and client errors into `TransportReply`

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use rustls::RootCertStore;

use crate::auth::{AuthBridge, AuthChallenge, Credentials};
use crate::config::{DispatcherConfig, TimeoutConfig};
use crate::transport::error::{ErrorKind, TransportError};
use crate::transport::tls::{self, CurrentRequest, TlsPolicy};
use crate::transport::{
    HttpManager, ManagerFactory, OutboundRequest, ProxyDescriptor, TransportReply,
};

/// Settings shared by every manager a factory builds.
struct ClientSettings {
    timeouts: TimeoutConfig,
    policy: TlsPolicy,
    roots: Arc<RootCertStore>,
    bridge: Arc<AuthBridge>,
}

/// Builds [`ReqwestManager`]s from dispatcher configuration.
pub struct ReqwestFactory {
    settings: Arc<ClientSettings>,
}

impl ReqwestFactory {
    pub fn new(config: &DispatcherConfig, bridge: Arc<AuthBridge>) -> Result<Self, TransportError> {
        let extra = match &config.tls.extra_ca_file {
            Some(path) => tls::load_extra_roots(Path::new(path))?,
            None => Vec::new(),
        };
        let policy = TlsPolicy::from_config(&config.tls);
        if policy == TlsPolicy::AcceptInvalid {
            tracing::warn!("TLS certificate validation errors will be reported but not enforced");
        }

        Ok(Self {
            settings: Arc::new(ClientSettings {
                timeouts: config.timeouts,
                policy,
                roots: Arc::new(tls::root_store(&extra)),
                bridge,
            }),
        })
    }
}

impl ManagerFactory for ReqwestFactory {
    fn create(&self, proxy: Option<&ProxyDescriptor>) -> Result<Arc<dyn HttpManager>, TransportError> {
        let manager = ReqwestManager::new(self.settings.clone(), proxy.cloned())?;
        Ok(Arc::new(manager))
    }
}

/// One `reqwest::Client`, optionally bound to a proxy.
pub struct ReqwestManager {
    settings: Arc<ClientSettings>,
    proxy: Option<ProxyDescriptor>,
    tls: rustls::ClientConfig,
    serving: CurrentRequest,
    client: ArcSwap<reqwest::Client>,
}

impl ReqwestManager {
    fn new(settings: Arc<ClientSettings>, proxy: Option<ProxyDescriptor>) -> Result<Self, TransportError> {
        let serving = CurrentRequest::default();
        let tls = tls::client_config(settings.policy, settings.roots.clone(), &settings.bridge, &serving)?;
        let client = build_client(&settings, proxy.as_ref(), &tls)?;

        Ok(Self {
            settings,
            proxy,
            tls,
            serving,
            client: ArcSwap::from_pointee(client),
        })
    }
}

impl fmt::Debug for ReqwestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestManager")
            .field("proxy", &self.proxy.as_ref().map(|p| p.endpoint()))
            .field("policy", &self.settings.policy)
            .finish()
    }
}

impl HttpManager for ReqwestManager {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'static, TransportReply> {
        self.serving.set(request.id);
        let client = self.client.load_full();
        let bridge = self.settings.bridge.clone();
        Box::pin(exchange(client, bridge, request))
    }

    fn clear_connection_cache(&self) {
        self.serving.clear();
        match build_client(&self.settings, self.proxy.as_ref(), &self.tls) {
            Ok(client) => self.client.store(Arc::new(client)),
            Err(e) => tracing::warn!(error = %e, "Failed to rebuild HTTP client, keeping the current one"),
        }
    }
}

fn build_client(
    settings: &ClientSettings,
    proxy: Option<&ProxyDescriptor>,
    tls: &rustls::ClientConfig,
) -> Result<reqwest::Client, TransportError> {
    let builder = reqwest::Client::builder()
        .connect_timeout(settings.timeouts.connect())
        .timeout(settings.timeouts.transfer())
        .use_preconfigured_tls(tls.clone());

    let builder = match proxy {
        Some(proxy) => {
            let mut upstream = reqwest::Proxy::all(proxy.url()).map_err(|e| {
                TransportError::new(ErrorKind::Unavailable, format!("invalid proxy {}: {}", proxy, e))
            })?;
            if let Some(credentials) = settings.bridge.answer_proxy_challenge(proxy) {
                upstream = upstream.basic_auth(&credentials.username, &credentials.password);
            }
            builder.proxy(upstream)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| TransportError::new(ErrorKind::Unavailable, format!("failed to build HTTP client: {}", e)))
}

async fn exchange(client: Arc<reqwest::Client>, bridge: Arc<AuthBridge>, request: OutboundRequest) -> TransportReply {
    let mut response = match send(&client, &request, None).await {
        Ok(response) => response,
        Err(e) => return TransportReply::failed(TransportError::from(&e), None, Bytes::new()),
    };

    if response.status() == StatusCode::UNAUTHORIZED && !request.headers.contains("authorization") {
        let answer = AuthChallenge::preferred(response.headers())
            .and_then(|challenge| bridge.answer_server_challenge(request.id, &challenge));
        if let Some(credentials) = answer {
            response = match send(&client, &request, Some(&credentials)).await {
                Ok(response) => response,
                Err(e) => return TransportReply::failed(TransportError::from(&e), None, Bytes::new()),
            };
        }
    }

    let status = response.status();
    match response.bytes().await {
        Ok(body) => match ErrorKind::from_status(status.as_u16()) {
            None => TransportReply::ok(status.as_u16(), body),
            Some(kind) => {
                let reason = status.canonical_reason().unwrap_or("unexpected status");
                TransportReply::failed(TransportError::new(kind, reason), Some(status.as_u16()), body)
            }
        },
        Err(e) => TransportReply::failed(TransportError::from(&e), Some(status.as_u16()), Bytes::new()),
    }
}

async fn send(
    client: &reqwest::Client,
    request: &OutboundRequest,
    credentials: Option<&Credentials>,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut builder = client.request(request.method.into(), request.url.clone());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(c) = credentials {
        builder = builder.basic_auth(&c.username, Some(&c.password));
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }
    builder.send().await
}
