//! Request and reply types exchanged with a manager.

use std::fmt;

use bytes::Bytes;
use url::Url;

use crate::dispatch::{CorrelationId, RequestHeaders};
use crate::transport::error::TransportError;

/// Supported request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// A fully prepared request, headers already merged.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub id: CorrelationId,
    pub method: Method,
    pub url: Url,
    pub headers: RequestHeaders,
    pub body: Bytes,
}

/// What a manager reports once an exchange is over.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// Upstream HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Response body; empty when no response was readable.
    pub body: Bytes,
    /// Set when the exchange failed.
    pub error: Option<TransportError>,
}

impl TransportReply {
    pub fn ok(status: u16, body: Bytes) -> Self {
        Self {
            status: Some(status),
            body,
            error: None,
        }
    }

    pub fn failed(error: TransportError, status: Option<u16>, body: Bytes) -> Self {
        Self {
            status,
            body,
            error: Some(error),
        }
    }
}
