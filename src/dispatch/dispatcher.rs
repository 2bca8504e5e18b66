//! Public request dispatcher.
//!
//! # Responsibilities
//! - Assign a correlation id to every request and return it synchronously
//! - Merge default and call-supplied headers, inject User-Agent and Content-Length
//! - Admit the request through the pool or schedule an admission-rejected failure
//! - Run the exchange on the runtime and deliver its terminal event

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;
use url::Url;

use crate::auth::{AuthBridge, Credentials};
use crate::config::{validate_config, ConfigError, DispatcherConfig};
use crate::dispatch::completion::{failure_message, Completion, InFlight, InFlightTable, SATURATED_MESSAGE};
use crate::dispatch::{
    event_channel, CorrelationId, DispatchError, EventSink, EventStream, IdSequence, RequestHeaders,
};
use crate::observability::metrics;
use crate::pool::{CheckoutError, ManagerPool, PoolStats};
use crate::transport::{
    ErrorKind, ManagerFactory, Method, OutboundRequest, ProxyDescriptor, ReqwestFactory,
};

/// Builds a [`Dispatcher`] and the event stream its owner listens on.
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    factory: Option<Arc<dyn ManagerFactory>>,
    ids: Option<Arc<IdSequence>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            factory: None,
            ids: None,
        }
    }

    /// Use another manager factory instead of the reqwest one.
    pub fn with_factory(mut self, factory: Arc<dyn ManagerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Draw ids from a private sequence instead of the process-wide one.
    pub fn with_id_sequence(mut self, ids: Arc<IdSequence>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the configuration and start the dispatcher on the current tokio runtime.
    pub fn build(self) -> Result<(Dispatcher, EventStream), DispatchError> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;
        let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        let (events, stream) = event_channel();
        let bridge = Arc::new(AuthBridge::new(events.clone()));
        if let Some(credentials) =
            Credentials::from_parts(config.auth.username.as_deref(), config.auth.password.as_deref())
        {
            bridge.set_credentials(credentials);
        }

        let factory: Arc<dyn ManagerFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(ReqwestFactory::new(&config, bridge.clone())?),
        };
        let proxies: Vec<ProxyDescriptor> = config.proxies.iter().map(ProxyDescriptor::from).collect();

        tracing::info!(
            ceiling = config.pool.max_concurrent,
            proxies = proxies.len(),
            idle_timeout_secs = config.pool.idle_timeout_secs,
            accept_invalid_certs = config.tls.accept_invalid_certs,
            "Dispatcher ready"
        );

        let pool = ManagerPool::new(config.pool.clone(), proxies, factory, runtime.clone());
        let core = DispatchCore {
            pool,
            ids: self.ids.unwrap_or_else(IdSequence::shared),
            defaults: ArcSwap::from_pointee(RequestHeaders::from(&config.request.default_headers)),
            user_agent: config.request.user_agent,
            bridge,
            events,
            in_flight: Arc::new(DashMap::new()),
            runtime,
        };

        Ok((Dispatcher { core: Arc::new(core) }, stream))
    }
}

struct DispatchCore {
    pool: ManagerPool,
    ids: Arc<IdSequence>,
    defaults: ArcSwap<RequestHeaders>,
    user_agent: String,
    bridge: Arc<AuthBridge>,
    events: EventSink,
    in_flight: InFlightTable,
    runtime: Handle,
}

/// Sends requests through the manager pool. Cloning shares the same dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    core: Arc<DispatchCore>,
}

impl Dispatcher {
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Submit a request. The id is returned at once; its terminal event arrives on the stream.
    ///
    /// # Panics
    /// If `url` is not an absolute http(s) URL with a host.
    pub fn send(
        &self,
        url: Url,
        method: Method,
        headers: RequestHeaders,
        body: impl Into<Bytes>,
    ) -> CorrelationId {
        assert!(
            matches!(url.scheme(), "http" | "https") && url.has_host(),
            "send requires an absolute http(s) URL, got {}",
            url
        );

        let core = &self.core;
        let body = body.into();
        let id = core.ids.next_id();

        let mut headers = core.defaults.load().merged_with(&headers);
        headers.insert_default("User-Agent", core.user_agent.as_str());
        if !body.is_empty() {
            headers.insert_default("Content-Length", body.len().to_string());
        }

        tracing::debug!(
            id = %id,
            method = %method,
            url = %url,
            headers = %headers,
            body_len = body.len(),
            "Sending request"
        );

        let lease = match core.pool.checkout(id) {
            Ok(lease) => lease,
            Err(CheckoutError::Saturated { .. }) => {
                self.reject(id, ErrorKind::AdmissionRejected, SATURATED_MESSAGE.to_string());
                return id;
            }
            Err(CheckoutError::Unavailable(error)) => {
                let message = failure_message(error.kind, None, &error.message, None, b"");
                self.reject(id, error.kind, message);
                return id;
            }
        };

        core.in_flight.insert(
            id,
            InFlight {
                method,
                url: url.clone(),
                proxy: lease.proxy.clone(),
                started: Instant::now(),
            },
        );

        let manager = lease.manager.clone();
        let completion = Completion::new(core.pool.clone(), core.events.clone(), core.in_flight.clone(), lease);
        let request = OutboundRequest {
            id,
            method,
            url,
            headers,
            body,
        };
        core.runtime.spawn(async move {
            let reply = manager.execute(request).await;
            completion.finish(reply);
        });

        id
    }

    pub fn get(&self, url: Url, headers: RequestHeaders) -> CorrelationId {
        self.send(url, Method::Get, headers, Bytes::new())
    }

    pub fn post(&self, url: Url, headers: RequestHeaders, body: impl Into<Bytes>) -> CorrelationId {
        self.send(url, Method::Post, headers, body)
    }

    /// Deliver a failure for a request that never reached a manager.
    /// The owner reads the stream only after `send` returns, so the id is always known first.
    fn reject(&self, id: CorrelationId, kind: ErrorKind, message: String) {
        metrics::record_request(kind.as_str(), Duration::ZERO);
        self.core.events.failure(id, kind, None, message);
    }

    /// Set the pair answered to server authentication challenges.
    /// Call before the first `send`.
    pub fn set_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        self.core.bridge.set_credentials(Credentials::new(username, password));
    }

    pub fn clear_credentials(&self) {
        self.core.bridge.clear_credentials();
    }

    /// Replace the headers sent with every request.
    pub fn set_default_headers(&self, headers: RequestHeaders) {
        self.core.defaults.store(Arc::new(headers));
    }

    pub fn default_headers(&self) -> RequestHeaders {
        self.core.defaults.load().as_ref().clone()
    }

    pub fn auth(&self) -> &AuthBridge {
        &self.core.bridge
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.core.pool.stats()
    }

    /// Number of admitted requests without a terminal event yet.
    pub fn in_flight(&self) -> usize {
        self.core.in_flight.len()
    }

    pub fn in_flight_request(&self, id: CorrelationId) -> Option<InFlight> {
        self.core.in_flight.get(&id).map(|entry| entry.value().clone())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.core.pool)
            .field("in_flight", &self.in_flight())
            .field("auth", &self.core.bridge)
            .finish()
    }
}
