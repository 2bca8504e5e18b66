//! Transport error classification.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Why a request did not produce a successful answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The pool was saturated; no I/O was attempted.
    AdmissionRejected,
    /// No manager could be built for the request.
    Unavailable,
    /// Connect or transfer deadline elapsed.
    Timeout,
    /// Connection could not be established (refused, DNS, proxy unreachable).
    Connect,
    /// TLS handshake or certificate validation failed.
    Tls,
    /// Redirect policy violated.
    Redirect,
    /// The response body could not be read.
    Body,
    /// The request could not be built or sent.
    Request,
    /// Upstream answered 401 and no credentials settled it.
    Authentication,
    /// Proxy answered 407.
    ProxyAuthentication,
    /// Upstream answered with another status >= 400.
    HttpStatus,
    /// The exchange was dropped before it produced a reply.
    Cancelled,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AdmissionRejected => "admission_rejected",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Redirect => "redirect",
            ErrorKind::Body => "body",
            ErrorKind::Request => "request",
            ErrorKind::Authentication => "authentication",
            ErrorKind::ProxyAuthentication => "proxy_authentication",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        }
    }

    /// Map an upstream status to a failure kind. `None` for non-error statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(ErrorKind::Authentication),
            407 => Some(ErrorKind::ProxyAuthentication),
            s if s >= 400 => Some(ErrorKind::HttpStatus),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&reqwest::Error> for TransportError {
    fn from(err: &reqwest::Error) -> Self {
        let kind = if is_tls_failure(err) {
            ErrorKind::Tls
        } else if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connect
        } else if err.is_redirect() {
            ErrorKind::Redirect
        } else if err.is_body() || err.is_decode() {
            ErrorKind::Body
        } else if err.is_builder() || err.is_request() {
            ErrorKind::Request
        } else if let Some(status) = err.status() {
            ErrorKind::from_status(status.as_u16()).unwrap_or(ErrorKind::Other)
        } else {
            ErrorKind::Other
        };
        Self::new(kind, describe(err))
    }
}

/// Walk the source chain looking for a rustls error.
///
/// `io::Error` hides its payload from `source()`, so it is unwrapped by hand.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(inner) = io.get_ref() {
                if is_tls_failure(inner) {
                    return true;
                }
            }
        }
        current = e.source();
    }
    false
}

/// Flatten an error and its causes into one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let cause = e.to_string();
        if !text.contains(&cause) {
            text.push_str(": ");
            text.push_str(&cause);
        }
        current = e.source();
    }
    text
}
