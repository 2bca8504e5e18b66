//! Terminal event delivery.
//!
//! # Responsibilities
//! - Own the lease of one admitted request until its exchange is over
//! - Check the manager back in before the terminal event is emitted
//! - Turn a reply into exactly one `Success` or `Failure`
//!
//! # Design Decisions
//! - A guard dropped without `finish` (task panic, runtime shutdown) still delivers a
//!   `Cancelled` failure, so no admitted id goes silent
//! - The terminal event goes out even when checkin unwinds; the panic resumes afterwards

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use url::Url;

use crate::dispatch::{CorrelationId, EventSink};
use crate::observability::metrics;
use crate::pool::{Lease, ManagerPool};
use crate::transport::{ErrorKind, Method, ProxyDescriptor, TransportError, TransportReply};

/// Failure text for a request rejected by admission control.
pub const SATURATED_MESSAGE: &str = "HTTP request fail. Too many requests sent at the same time";

/// Bookkeeping for one admitted request.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub method: Method,
    pub url: Url,
    pub proxy: Option<ProxyDescriptor>,
    pub started: Instant,
}

pub(crate) type InFlightTable = Arc<DashMap<CorrelationId, InFlight>>;

/// Build the failure text delivered with a `Failure` event.
pub fn failure_message(
    kind: ErrorKind,
    upstream_status: Option<u16>,
    detail: &str,
    proxy: Option<&ProxyDescriptor>,
    answer: &[u8],
) -> String {
    let proxy = match proxy {
        Some(p) => format!(" Proxy: {}.", p.endpoint()),
        None => String::new(),
    };
    format!(
        "HTTP request fail. Code: {}. Server code: {}. Message: {}.{} Answer: {}",
        kind,
        upstream_status.unwrap_or(0),
        detail,
        proxy,
        String::from_utf8_lossy(answer)
    )
}

pub(crate) struct Completion {
    pool: ManagerPool,
    events: EventSink,
    in_flight: InFlightTable,
    lease: Option<Lease>,
    started: Instant,
}

impl Completion {
    pub(crate) fn new(pool: ManagerPool, events: EventSink, in_flight: InFlightTable, lease: Lease) -> Self {
        Self {
            pool,
            events,
            in_flight,
            lease: Some(lease),
            started: Instant::now(),
        }
    }

    pub(crate) fn finish(mut self, reply: TransportReply) {
        if let Some(lease) = self.lease.take() {
            self.deliver(lease, reply);
        }
    }

    fn deliver(&self, lease: Lease, reply: TransportReply) {
        let id = lease.id;
        let checkin = panic::catch_unwind(AssertUnwindSafe(|| self.pool.checkin(id)));
        self.in_flight.remove(&id);
        let elapsed = self.started.elapsed();

        match reply.error {
            None => {
                tracing::debug!(
                    id = %id,
                    status = ?reply.status,
                    bytes = reply.body.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
                metrics::record_request("success", elapsed);
                self.events.success(id, reply.body);
            }
            Some(error) => {
                let message = failure_message(
                    error.kind,
                    reply.status,
                    &error.message,
                    lease.proxy.as_ref(),
                    &reply.body,
                );
                tracing::warn!(id = %id, kind = %error.kind, status = ?reply.status, "{}", message);
                metrics::record_request(error.kind.as_str(), elapsed);
                self.events.failure(id, error.kind, reply.status, message);
            }
        }

        if let Err(payload) = checkin {
            tracing::error!(id = %id, "Checkin panicked after the request completed");
            if !std::thread::panicking() {
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            tracing::warn!(id = %lease.id, "Exchange dropped before it produced a reply");
            let reply = TransportReply::failed(
                TransportError::new(ErrorKind::Cancelled, "request dropped before completion"),
                None,
                Bytes::new(),
            );
            self.deliver(lease, reply);
        }
    }
}
