//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream answers 401 + WWW-Authenticate
//!     → challenge.rs (parse scheme, realm)
//!     → bridge.rs (configured user/password, Basic only)
//!     → manager resends once with credentials
//!
//! Manager built for a proxy
//!     → bridge.rs (credentials embedded in the proxy descriptor)
//!     → installed on the client's proxy settings
//!
//! Lenient TLS verifier sees a bad certificate
//!     → bridge.rs → Log { Warning, "SSL Error: ..." } event
//! ```

pub mod bridge;
pub mod challenge;
pub mod credentials;

pub use bridge::AuthBridge;
pub use challenge::{AuthChallenge, AuthScheme};
pub use credentials::Credentials;
