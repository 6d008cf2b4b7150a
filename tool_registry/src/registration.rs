//! One remote endpoint: its connection recipe and the tools it serves.

use std::{collections::HashMap, path::Path, sync::Arc};

use bytes::Bytes;
use smg_grpc_bridge::BridgeChannel;
use tracing::info;

use crate::{
    auto_discovery,
    channel::{grpc_channel_factory, ChannelFactory, ToolChannelHolder},
    error::RegistryResult,
    group::ToolGroupSet,
    persist,
};

#[derive(Debug)]
pub struct ToolRegistration {
    name: String,
    holder: Arc<ToolChannelHolder<BridgeChannel>>,
    group_set: ToolGroupSet,
}

impl ToolRegistration {
    /// A registration whose channel is connected lazily on first use.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        options: HashMap<String, String>,
    ) -> Self {
        Self::with_factory(name, target, options, grpc_channel_factory())
    }

    pub fn with_factory(
        name: impl Into<String>,
        target: impl Into<String>,
        options: HashMap<String, String>,
        factory: ChannelFactory<BridgeChannel>,
    ) -> Self {
        let name = name.into();
        Self {
            holder: Arc::new(ToolChannelHolder::new(factory, target, options)),
            group_set: ToolGroupSet::new(name.clone()),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        self.holder.target()
    }

    pub fn options(&self) -> &HashMap<String, String> {
        self.holder.options()
    }

    pub fn group_set(&self) -> &ToolGroupSet {
        &self.group_set
    }

    pub fn holder(&self) -> &Arc<ToolChannelHolder<BridgeChannel>> {
        &self.holder
    }

    /// The channel, connected on the first call.
    pub fn channel(&self) -> RegistryResult<Arc<BridgeChannel>> {
        self.holder.get()
    }

    /// Replace the groups with whatever the server currently advertises.
    pub async fn reload_by_auto_discovery(&self) -> RegistryResult<()> {
        auto_discovery::reload_by_auto_discovery(&self.group_set, &self.holder).await
    }

    /// Replace the groups with a snapshot produced by [`save`](Self::save).
    pub fn reload(&self, snapshot: &[u8]) -> RegistryResult<()> {
        let groups = persist::decode(snapshot)?;
        info!(
            registration = %self.name,
            groups = groups.len(),
            "Reloaded tool groups from snapshot"
        );
        self.group_set.replace(groups);
        Ok(())
    }

    pub async fn reload_from_file(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        let snapshot = tokio::fs::read(path.as_ref()).await?;
        self.reload(&snapshot)
    }

    /// Snapshot of the current groups, descriptors included.
    pub fn save(&self) -> Bytes {
        persist::encode(&self.group_set.groups())
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.save()).await?;
        info!(registration = %self.name, path = %path.display(), "Saved tool groups");
        Ok(())
    }

    /// Close the channel. The registration cannot reconnect afterwards.
    pub fn close(&self) {
        self.holder.close();
    }
}

#[cfg(test)]
mod tests {
    use smg_grpc_bridge::{descriptor, testing, MethodSignature};

    use super::*;
    use crate::{
        error::RegistryError,
        group::{Tool, ToolGroup},
    };

    fn upper_case_group() -> ToolGroup {
        let files = descriptor::load(testing::DESCRIPTOR_SET).unwrap();
        let pool = files[testing::UPPER_CASE_FILE].parent_pool().clone();
        let signature = MethodSignature::from_pool(&pool, "UpperCase", "toUpperCase").unwrap();
        ToolGroup::new("UpperCase", vec![Tool::new(signature, vec![])])
    }

    #[test]
    fn test_channel_is_created_on_demand() {
        let registration = ToolRegistration::new("backend", "127.0.0.1:50051", HashMap::new());
        assert!(!registration.holder().is_created());
        assert_eq!(registration.group_set().registration(), "backend");
    }

    #[test]
    fn test_close_refuses_new_channel() {
        let registration = ToolRegistration::new("backend", "127.0.0.1:50051", HashMap::new());
        registration.close();
        assert!(matches!(
            registration.channel(),
            Err(RegistryError::ChannelClosed(_))
        ));
    }

    #[test]
    fn test_save_then_reload_into_another_registration() {
        let source = ToolRegistration::new("a", "127.0.0.1:1", HashMap::new());
        source.group_set().add(upper_case_group()).unwrap();

        let target = ToolRegistration::new("b", "127.0.0.1:2", HashMap::new());
        target.reload(&source.save()).unwrap();
        let tools = target.group_set().tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "UpperCase.toUpperCase");
    }

    #[test]
    fn test_failed_reload_keeps_previous_groups() {
        let registration = ToolRegistration::new("a", "127.0.0.1:1", HashMap::new());
        registration.group_set().add(upper_case_group()).unwrap();

        assert!(registration.reload(b"\xff\xff\xff").is_err());
        assert!(registration.group_set().contains("UpperCase"));
    }
}
