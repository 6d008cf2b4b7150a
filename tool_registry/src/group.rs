//! Tools, tool groups and the per-registration group set.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smg_grpc_bridge::MethodSignature;

use crate::error::{RegistryError, RegistryResult};

/// One invokable method plus its discovery tags.
#[derive(Debug, Clone)]
pub struct Tool {
    signature: MethodSignature,
    tags: Vec<String>,
    group: String,
}

impl Tool {
    /// Tags keep their first-seen order; duplicates are dropped.
    pub fn new(signature: MethodSignature, tags: impl IntoIterator<Item = String>) -> Self {
        let tags: IndexSet<String> = tags.into_iter().collect();
        Self {
            signature,
            tags: tags.into_iter().collect(),
            group: String::new(),
        }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Name of the owning group.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> String {
        self.signature.tool_name()
    }

    /// True when every one of `required` is among this tool's tags.
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }
}

#[derive(Debug, Clone)]
pub struct ToolGroup {
    name: String,
    tools: Vec<Tool>,
}

impl ToolGroup {
    pub fn new(name: impl Into<String>, tools: Vec<Tool>) -> Self {
        let name = name.into();
        let tools = tools
            .into_iter()
            .map(|mut tool| {
                tool.group = name.clone();
                tool
            })
            .collect();
        Self { name, tools }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Ordered groups of one registration.
///
/// Readers always see a complete snapshot: bulk reloads build the new map
/// off to the side and swap it in whole.
#[derive(Debug)]
pub struct ToolGroupSet {
    registration: String,
    groups: RwLock<Arc<IndexMap<String, ToolGroup>>>,
}

impl ToolGroupSet {
    pub fn new(registration: impl Into<String>) -> Self {
        Self {
            registration: registration.into(),
            groups: RwLock::new(Arc::new(IndexMap::new())),
        }
    }

    /// Name of the owning registration.
    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn add(&self, group: ToolGroup) -> RegistryResult<()> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(RegistryError::GroupExists(group.name().to_string()));
        }
        Arc::make_mut(&mut *groups).insert(group.name().to_string(), group);
        Ok(())
    }

    pub fn update(&self, group: ToolGroup) -> RegistryResult<()> {
        let mut groups = self.groups.write();
        if !groups.contains_key(group.name()) {
            return Err(RegistryError::GroupNotFound(group.name().to_string()));
        }
        Arc::make_mut(&mut *groups).insert(group.name().to_string(), group);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> RegistryResult<ToolGroup> {
        let mut groups = self.groups.write();
        if !groups.contains_key(name) {
            return Err(RegistryError::GroupNotFound(name.to_string()));
        }
        Arc::make_mut(&mut *groups)
            .shift_remove(name)
            .ok_or_else(|| RegistryError::GroupNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> RegistryResult<ToolGroup> {
        self.groups
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::GroupNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Current snapshot, in insertion order.
    pub fn snapshot(&self) -> Arc<IndexMap<String, ToolGroup>> {
        self.groups.read().clone()
    }

    pub fn groups(&self) -> Vec<ToolGroup> {
        self.snapshot().values().cloned().collect()
    }

    /// Every tool of every group, in group order.
    pub fn tools(&self) -> Vec<Tool> {
        self.snapshot()
            .values()
            .flat_map(|group| group.tools().iter().cloned())
            .collect()
    }

    /// Swap in a complete set of groups.
    pub fn replace(&self, groups: IndexMap<String, ToolGroup>) {
        *self.groups.write() = Arc::new(groups);
    }
}

/// Collect groups into a map, rejecting duplicate names.
pub fn group_map(groups: Vec<ToolGroup>) -> RegistryResult<IndexMap<String, ToolGroup>> {
    let mut map = IndexMap::with_capacity(groups.len());
    for group in groups {
        if map.contains_key(group.name()) {
            return Err(RegistryError::GroupExists(group.name().to_string()));
        }
        map.insert(group.name().to_string(), group);
    }
    Ok(map)
}
