//! Turns a server's reflected services into tool groups.
//!
//! A method becomes a tool when its innermost explicit `*_auto_discovery`
//! option is true, or when nothing below the file says otherwise and the file
//! opts in. Streaming methods are never tools.

use std::collections::HashMap;

use indexmap::IndexMap;
use prost_reflect::ServiceDescriptor;
use smg_grpc_bridge::{options, BridgeChannel, Discovered, MethodSignature, ReflectionClient};
use tracing::{debug, info};

use crate::{
    channel::ToolChannelHolder,
    error::RegistryResult,
    group::{group_map, Tool, ToolGroup, ToolGroupSet},
};

/// Whether auto-discovery turns this method into a tool.
pub fn is_discoverable(signature: &MethodSignature) -> bool {
    signature.auto_discovery().enabled() && !signature.is_streaming()
}

/// Tool for one discoverable method. Method tags come before service tags.
pub fn discovered_tool(signature: MethodSignature) -> Tool {
    let tags: Vec<String> = signature
        .method_tags()
        .iter()
        .chain(signature.service_tags())
        .cloned()
        .collect();
    Tool::new(signature, tags)
}

/// Group for one service, or `None` when no method qualifies.
pub fn service_group(service: &ServiceDescriptor) -> Option<ToolGroup> {
    let tools: Vec<Tool> = service
        .methods()
        .map(MethodSignature::new)
        .filter(is_discoverable)
        .map(discovered_tool)
        .collect();

    if tools.is_empty() {
        debug!(service = %service.full_name(), "No discoverable methods");
        return None;
    }
    let name = options::group_name(service).unwrap_or_else(|| service.full_name().to_string());
    Some(ToolGroup::new(name, tools))
}

/// Groups for every listed service, in listing order.
pub fn build_groups(discovered: &Discovered) -> RegistryResult<IndexMap<String, ToolGroup>> {
    let services: HashMap<String, ServiceDescriptor> = discovered
        .files
        .values()
        .flat_map(|file| file.services())
        .map(|service| (service.full_name().to_string(), service))
        .collect();

    let groups = discovered
        .services
        .iter()
        .filter_map(|name| services.get(name))
        .filter_map(service_group)
        .collect();
    group_map(groups)
}

/// Rediscover the server behind `holder` and swap the result into `group_set`.
/// The previous groups stay in place if any step fails.
pub async fn reload_by_auto_discovery(
    group_set: &ToolGroupSet,
    holder: &ToolChannelHolder<BridgeChannel>,
) -> RegistryResult<()> {
    let channel = holder.get()?;
    let mut client = ReflectionClient::connect(&channel).await?;
    let discovered = client.discover().await?;
    let groups = build_groups(&discovered)?;

    let tools: usize = groups.values().map(ToolGroup::len).sum();
    info!(
        registration = %group_set.registration(),
        address = %holder.target(),
        services = discovered.services.len(),
        groups = groups.len(),
        tools,
        "Auto-discovery completed"
    );
    group_set.replace(groups);
    Ok(())
}
