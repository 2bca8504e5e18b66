//! Dispatcher construction errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher must be built inside a tokio runtime")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
}
