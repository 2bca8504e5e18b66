//! Outbound HTTP(S) request dispatcher.
//!
//! Many logical requests share a bounded pool of reusable HTTP clients ("managers"),
//! each optionally bound to one upstream proxy. Every request gets a correlation id
//! synchronously and exactly one terminal event asynchronously.
//!
//! ```text
//!   caller ──send()──▶ dispatch ──checkout──▶ pool ──create──▶ transport (reqwest)
//!      ▲                  │                     ▲                  │
//!      │                  │                     └────checkin───────┤
//!      └── EventStream ◀──┴──── completion ◀───────── reply ◀──────┘
//!                                                          auth (challenges, TLS warnings)
//! ```

// Core subsystems
pub mod dispatch;
pub mod pool;
pub mod transport;

// Collaborators
pub mod auth;
pub mod config;

// Cross-cutting concerns
pub mod observability;

pub use config::DispatcherConfig;
pub use dispatch::{
    CorrelationId, DispatchError, DispatchEvent, Dispatcher, DispatcherBuilder, EventStream,
    RequestHeaders, Severity,
};
pub use transport::{ErrorKind, Method};
