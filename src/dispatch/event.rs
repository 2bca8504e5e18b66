//! Events delivered to the dispatcher's owner.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::dispatch::CorrelationId;
use crate::transport::ErrorKind;

/// Severity codes understood by the logging collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug = 0,
    Information = 1,
    Warning = 2,
    Critical = 3,
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }
}

/// Something the owner of a dispatcher needs to hear about.
///
/// Every id returned by `send` receives exactly one `Success` or `Failure`.
/// `Log` events are informational and may appear any number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Success {
        id: CorrelationId,
        body: Bytes,
    },
    Failure {
        id: CorrelationId,
        kind: ErrorKind,
        /// HTTP status of the upstream answer, when there was one.
        upstream_status: Option<u16>,
        message: String,
    },
    Log {
        id: Option<CorrelationId>,
        severity: Severity,
        message: String,
    },
}

impl DispatchEvent {
    /// Correlation id the event belongs to.
    pub fn id(&self) -> Option<CorrelationId> {
        match self {
            DispatchEvent::Success { id, .. } | DispatchEvent::Failure { id, .. } => Some(*id),
            DispatchEvent::Log { id, .. } => *id,
        }
    }

    /// True for the single event that closes a request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DispatchEvent::Log { .. })
    }
}

/// Receiving half handed to the dispatcher's owner.
pub type EventStream = mpsc::UnboundedReceiver<DispatchEvent>;

/// Sending half shared by the dispatcher, its tasks and the auth bridge.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DispatchEvent>,
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

impl EventSink {
    pub fn emit(&self, event: DispatchEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event stream closed, dropping event");
        }
    }

    pub fn success(&self, id: CorrelationId, body: Bytes) {
        self.emit(DispatchEvent::Success { id, body });
    }

    pub fn failure(&self, id: CorrelationId, kind: ErrorKind, upstream_status: Option<u16>, message: String) {
        self.emit(DispatchEvent::Failure {
            id,
            kind,
            upstream_status,
            message,
        });
    }

    pub fn log(&self, id: Option<CorrelationId>, severity: Severity, message: String) {
        self.emit(DispatchEvent::Log { id, severity, message });
    }
}
