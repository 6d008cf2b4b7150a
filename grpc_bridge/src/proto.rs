//! Generated `smg.tool.v1` messages.

#![allow(clippy::all, unused_qualifications)]

tonic::include_proto!("smg.tool.v1");

/// Encoded `FileDescriptorSet` of `tool_options.proto` and `tool_group_set.proto`.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("smg_tool_descriptor");
