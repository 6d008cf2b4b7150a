//! Registry error types.

use smg_grpc_bridge::BridgeError;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registration already exists: {0}")]
    RegistrationExists(String),

    #[error("Registration does not exist: {0}")]
    RegistrationNotFound(String),

    #[error("Group already exists: {0}")]
    GroupExists(String),

    #[error("Group does not exist: {0}")]
    GroupNotFound(String),

    #[error("Channel to {0} is closed")]
    ChannelClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
}
