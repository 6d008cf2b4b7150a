//! Registry of gRPC backed tools.
//!
//! A [`ToolRegistration`] pairs a lazily connected channel with the tool
//! groups its server offers, filled by auto-discovery over server reflection
//! or restored from a saved snapshot. The [`ToolRegistry`] holds
//! registrations by name and resolves tag queries into invokers.

pub mod auto_discovery;
pub mod channel;
pub mod config;
pub mod error;
pub mod group;
pub mod persist;
pub mod registration;
pub mod registry;

pub use channel::{grpc_channel_factory, ChannelFactory, ToolChannel, ToolChannelHolder};
pub use config::{RegistrationConfig, ToolBridgeConfig};
pub use error::{RegistryError, RegistryResult};
pub use group::{Tool, ToolGroup, ToolGroupSet};
pub use registration::ToolRegistration;
pub use registry::ToolRegistry;
