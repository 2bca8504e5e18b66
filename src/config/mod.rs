//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatcherConfig (validated, immutable)
//!     → consumed once by DispatcherBuilder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the proxy list is fixed for the pool's lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::DispatcherConfig;
pub use schema::{
    AuthConfig, LogFormat, ObservabilityConfig, PoolConfig, ProxyConfig, ProxyKind, RequestConfig,
    SelectionPolicy, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
