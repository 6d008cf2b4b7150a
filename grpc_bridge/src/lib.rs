//! gRPC methods as self-describing, dynamically invokable tools.
//!
//! Descriptors drive everything here: JSON schemas are synthesized from
//! message descriptors, requests are built as [`prost_reflect::DynamicMessage`]s
//! from JSON and sent over a plain [`tonic::transport::Channel`].

pub mod channel;
pub mod codec;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod invoker;
pub mod naming;
pub mod options;
pub mod proto;
pub mod reflection;
pub mod schema;
pub mod signature;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use channel::{BridgeChannel, GrpcChannelOptions, NegotiationType};
pub use context::{ToolContext, TOOL_CONTEXT_HEADER};
pub use error::{BridgeError, BridgeResult};
pub use invoker::{DynamicInvoker, ToolDefinition};
pub use reflection::{Discovered, ReflectionClient};
pub use signature::{AutoDiscoveryFlags, MethodSignature};
