//! Offline snapshots of a group set.
//!
//! A snapshot stores each tool as `(filename, service, method, tags)` plus
//! every descriptor file those tools need, so a registration can be restored
//! without talking to the server.

use std::collections::BTreeMap;

use bytes::Bytes;
use indexmap::IndexMap;
use prost::Message;
use prost_reflect::FileDescriptor;
use smg_grpc_bridge::{descriptor, proto, BridgeError, MethodSignature};

use crate::{
    error::RegistryResult,
    group::{group_map, Tool, ToolGroup},
};

/// Encode groups as a `smg.tool.v1.ToolGroupSet` message.
pub fn encode(groups: &[ToolGroup]) -> Bytes {
    let mut files: IndexMap<String, FileDescriptor> = IndexMap::new();
    let groups = groups
        .iter()
        .map(|group| proto::ToolGroup {
            name: group.name().to_string(),
            tools: group
                .tools()
                .iter()
                .map(|tool| {
                    let signature = tool.signature();
                    let file = signature.descriptor().parent_file();
                    files.entry(file.name().to_string()).or_insert(file);
                    proto::Tool {
                        filename: signature.filename(),
                        service_name: signature.service_name().to_string(),
                        method_name: signature.method_name().to_string(),
                        tags: tool.tags().to_vec(),
                    }
                })
                .collect(),
        })
        .collect();

    let set = proto::ToolGroupSet {
        groups,
        all_dependencies: descriptor::save(files.into_values()).to_vec(),
    };
    Bytes::from(set.encode_to_vec())
}

/// Decode a snapshot into groups, resolving every tool against the embedded
/// descriptors. Nothing is returned unless every tool resolves.
pub fn decode(bytes: &[u8]) -> RegistryResult<IndexMap<String, ToolGroup>> {
    let set = proto::ToolGroupSet::decode(bytes)?;
    let files = descriptor::load(&set.all_dependencies)?;

    let mut groups = Vec::with_capacity(set.groups.len());
    for group in set.groups {
        let tools = group
            .tools
            .into_iter()
            .map(|tool| resolve(&files, tool))
            .collect::<RegistryResult<Vec<_>>>()?;
        groups.push(ToolGroup::new(group.name, tools));
    }
    group_map(groups)
}

fn resolve(files: &BTreeMap<String, FileDescriptor>, tool: proto::Tool) -> RegistryResult<Tool> {
    let file = files
        .get(&tool.filename)
        .ok_or_else(|| BridgeError::FileNotFound(tool.filename.clone()))?;
    let service = file
        .services()
        .find(|service| service.name() == tool.service_name)
        .ok_or_else(|| {
            BridgeError::ServiceNotFound(format!("{} in {}", tool.service_name, tool.filename))
        })?;
    let method = service
        .methods()
        .find(|method| method.name() == tool.method_name)
        .ok_or_else(|| {
            BridgeError::MethodNotFound(format!("{}/{}", service.full_name(), tool.method_name))
        })?;
    Ok(Tool::new(MethodSignature::new(method), tool.tags))
}
