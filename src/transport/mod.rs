//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! ManagerPool needs a manager
//!     → ManagerFactory::create(proxy)
//!         → reqwest_manager.rs (client bound to one proxy, timeouts, TLS policy)
//!         → tls.rs (root store, optional lenient verifier)
//! Dispatcher issues a request
//!     → HttpManager::execute(OutboundRequest)
//!     → TransportReply (status, body, classified error)
//! Checkin
//!     → HttpManager::clear_connection_cache()
//! ```
//!
//! # Design Decisions
//! - The pool only sees the traits; tests swap in a recording mock
//! - A manager is leased to one request at a time, so per-request state may live on it
//! - Errors are classified once here, never re-parsed downstream

pub mod error;
pub mod proxy;
pub mod reqwest_manager;
pub mod request;
pub mod tls;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use error::{ErrorKind, TransportError};
pub use proxy::ProxyDescriptor;
pub use reqwest_manager::{ReqwestFactory, ReqwestManager};
pub use request::{Method, OutboundRequest, TransportReply};
pub use tls::TlsPolicy;

/// One reusable HTTP client instance.
pub trait HttpManager: Send + Sync + fmt::Debug {
    /// Run one exchange to completion. Never fails as a future; failures are in the reply.
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'static, TransportReply>;

    /// Forget pooled connections and any other per-connection state.
    fn clear_connection_cache(&self);
}

/// Builds managers, optionally bound to a proxy.
pub trait ManagerFactory: Send + Sync {
    fn create(&self, proxy: Option<&ProxyDescriptor>) -> Result<Arc<dyn HttpManager>, TransportError>;
}
