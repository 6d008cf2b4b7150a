//! Bridge error types.
//!
//! Covers descriptor resolution, channel configuration, invocation and
//! serialization failures. Transport failures are carried unmodified.

use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unsupported method: {0} is a streaming method")]
    UnsupportedMethod(String),

    #[error("Invalid channel option '{key}': {reason}")]
    InvalidChannelOption { key: String, reason: String },

    #[error("Dependency not found: {dependency} (required by {file})")]
    DependencyNotFound { file: String, dependency: String },

    #[error("Dependency cycle detected: {}", chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("File descriptor not found: {0}")]
    FileNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Channel is closed")]
    ChannelClosed,

    #[error("Reflection error: {0}")]
    Reflection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[source] serde_json::Error),

    #[error("Invalid tool context: {0}")]
    InvalidContext(String),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),

    #[error(transparent)]
    Status(#[from] Box<tonic::Status>),

    #[error(transparent)]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tonic::Status> for BridgeError {
    fn from(status: tonic::Status) -> Self {
        Self::Status(Box::new(status))
    }
}
