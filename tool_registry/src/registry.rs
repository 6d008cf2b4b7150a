//! Registrations keyed by name, and tool lookup across them.

use std::{mem, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use smg_grpc_bridge::DynamicInvoker;
use tracing::{debug, info};

use crate::{
    config::ToolBridgeConfig,
    error::{RegistryError, RegistryResult},
    registration::ToolRegistration,
};

#[derive(Debug, Default)]
pub struct ToolRegistry {
    registrations: DashMap<String, Arc<ToolRegistration>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from config, discovering or restoring each entry's tools.
    pub async fn from_config(config: &ToolBridgeConfig) -> RegistryResult<Self> {
        config.validate()?;
        let registry = Self::new();
        for entry in &config.registrations {
            let registration =
                ToolRegistration::new(&entry.name, &entry.target, entry.options.clone());
            if let Some(path) = &entry.group_set_file {
                registration.reload_from_file(path).await?;
            } else if entry.auto_discovery {
                registration.reload_by_auto_discovery().await?;
            }
            registry.register(registration)?;
        }
        Ok(registry)
    }

    pub fn register(&self, registration: ToolRegistration) -> RegistryResult<Arc<ToolRegistration>> {
        match self.registrations.entry(registration.name().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::RegistrationExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let registration = Arc::new(registration);
                info!(
                    registration = %registration.name(),
                    address = %registration.target(),
                    groups = registration.group_set().len(),
                    "Registered tool registration"
                );
                entry.insert(Arc::clone(&registration));
                Ok(registration)
            }
        }
    }

    /// Auto-discover the registration's tools, then register it.
    pub async fn register_by_auto_discovery(
        &self,
        registration: ToolRegistration,
    ) -> RegistryResult<Arc<ToolRegistration>> {
        if self.contains(registration.name()) {
            return Err(RegistryError::RegistrationExists(
                registration.name().to_string(),
            ));
        }
        registration.reload_by_auto_discovery().await?;
        self.register(registration)
    }

    /// Remove a registration and close its channel. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        match self.registrations.remove(name) {
            Some((_, registration)) => {
                registration.close();
                info!(registration = %name, "Unregistered tool registration");
                true
            }
            None => {
                debug!(registration = %name, "Unregister of unknown registration ignored");
                false
            }
        }
    }

    /// Replace an existing registration, closing the one it replaces.
    pub fn update(&self, registration: ToolRegistration) -> RegistryResult<Arc<ToolRegistration>> {
        let registration = Arc::new(registration);
        let replacement = Arc::clone(&registration);
        self.update_with(registration.name(), move |_| replacement)?;
        Ok(registration)
    }

    /// Swap the registration named `name` for `f(current)`. The old one is
    /// closed unless `f` hands back the same instance. `f` runs under the
    /// entry's lock and must not call back into the registry.
    pub fn update_with<F>(&self, name: &str, f: F) -> RegistryResult<()>
    where
        F: FnOnce(&Arc<ToolRegistration>) -> Arc<ToolRegistration>,
    {
        let previous = {
            let mut entry = self
                .registrations
                .get_mut(name)
                .ok_or_else(|| RegistryError::RegistrationNotFound(name.to_string()))?;
            let next = f(entry.value());
            if Arc::ptr_eq(&next, entry.value()) {
                return Ok(());
            }
            mem::replace(entry.value_mut(), next)
        };

        previous.close();
        info!(registration = %name, "Updated tool registration");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolRegistration>> {
        self.registrations
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Registration names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invokers for every tool carrying all of `tags`, limited to one
    /// registration when a non-blank `registration` is given.
    ///
    /// Registrations are visited in name order, tools in group order. A
    /// registration's channel is only connected if one of its tools matches.
    pub fn find(
        &self,
        registration: Option<&str>,
        tags: &[String],
    ) -> RegistryResult<Vec<DynamicInvoker>> {
        let registration = registration.filter(|name| !name.trim().is_empty());
        let registrations: Vec<Arc<ToolRegistration>> = match registration {
            Some(name) => self.get(name).into_iter().collect(),
            None => {
                let mut all: Vec<_> = self
                    .registrations
                    .iter()
                    .map(|entry| Arc::clone(entry.value()))
                    .collect();
                all.sort_by(|a, b| a.name().cmp(b.name()));
                all
            }
        };

        let mut invokers = Vec::new();
        for candidate in registrations {
            let tools: Vec<_> = candidate
                .group_set()
                .tools()
                .into_iter()
                .filter(|tool| tool.has_tags(tags))
                .collect();
            if tools.is_empty() {
                continue;
            }

            let channel = candidate.channel()?;
            for tool in tools {
                let invoker = DynamicInvoker::new(tool.signature().clone(), (*channel).clone())?
                    .with_tags(tool.tags().to_vec());
                invokers.push(invoker);
            }
        }
        debug!(
            registration = registration.unwrap_or("*"),
            tags = ?tags,
            found = invokers.len(),
            "Resolved tools"
        );
        Ok(invokers)
    }

    pub fn find_all(&self) -> RegistryResult<Vec<DynamicInvoker>> {
        self.find(None, &[])
    }

    pub fn find_by_registration(&self, registration: &str) -> RegistryResult<Vec<DynamicInvoker>> {
        self.find(Some(registration), &[])
    }

    pub fn find_by_tags(&self, tags: &[String]) -> RegistryResult<Vec<DynamicInvoker>> {
        self.find(None, tags)
    }

    /// Invokers for every tool of the group named `group`, across registrations.
    pub fn find_by_group(&self, group: &str) -> RegistryResult<Vec<DynamicInvoker>> {
        let mut invokers = Vec::new();
        for name in self.names() {
            let Some(registration) = self.get(&name) else {
                continue;
            };
            let Ok(found) = registration.group_set().get(group) else {
                continue;
            };
            if found.is_empty() {
                continue;
            }
            let channel = registration.channel()?;
            for tool in found.tools() {
                invokers.push(
                    DynamicInvoker::new(tool.signature().clone(), (*channel).clone())?
                        .with_tags(tool.tags().to_vec()),
                );
            }
        }
        Ok(invokers)
    }

    /// Unregister everything, closing each channel.
    pub fn close(&self) {
        for name in self.names() {
            self.unregister(&name);
        }
    }
}
