//! Method signatures resolved from loaded descriptors.
//!
//! A [`MethodSignature`] captures everything the bridge needs from one RPC
//! method: its descriptors plus the tool option extensions declared at the
//! file, service, method and field level.

use prost_reflect::{DescriptorPool, MessageDescriptor, MethodDescriptor};

use crate::{
    error::{BridgeError, BridgeResult},
    naming, options, schema,
};

/// Auto-discovery switches as declared at each level. `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoDiscoveryFlags {
    pub file: Option<bool>,
    pub service: Option<bool>,
    pub method: Option<bool>,
}

impl AutoDiscoveryFlags {
    /// Innermost explicit setting wins; an unset file level never enables.
    pub fn enabled(&self) -> bool {
        self.method
            .or(self.service)
            .unwrap_or(self.file == Some(true))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    method: MethodDescriptor,
    display_name: Option<String>,
    description: Option<String>,
    required_fields: Vec<String>,
    auto_discovery: AutoDiscoveryFlags,
    service_tags: Vec<String>,
    method_tags: Vec<String>,
    group_name: Option<String>,
}

impl MethodSignature {
    pub fn new(method: MethodDescriptor) -> Self {
        let service = method.parent_service();
        let required_fields = method
            .input()
            .fields()
            .filter(|field| schema::real_oneof(field).is_none() && options::field_required(field))
            .map(|field| field.name().to_string())
            .collect();

        Self {
            display_name: options::method_name(&method),
            description: options::method_desc(&method),
            required_fields,
            auto_discovery: AutoDiscoveryFlags {
                file: options::file_auto_discovery(&method.parent_file()),
                service: options::service_auto_discovery(service),
                method: options::method_auto_discovery(&method),
            },
            service_tags: options::service_tags(service),
            method_tags: options::method_tags(&method),
            group_name: options::group_name(service),
            method,
        }
    }

    /// Resolve `<service full name>/<method>` from a pool.
    pub fn from_pool(pool: &DescriptorPool, service: &str, method: &str) -> BridgeResult<Self> {
        let service_desc = pool
            .get_service_by_name(service)
            .ok_or_else(|| BridgeError::ServiceNotFound(service.to_string()))?;
        let method_desc = service_desc
            .methods()
            .find(|m| m.name() == method)
            .ok_or_else(|| BridgeError::MethodNotFound(format!("{service}/{method}")))?;
        Ok(Self::new(method_desc))
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn service_full_name(&self) -> &str {
        self.method.parent_service().full_name()
    }

    pub fn service_name(&self) -> &str {
        self.method.parent_service().name()
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// Name of the file declaring the service.
    pub fn filename(&self) -> String {
        self.method.parent_file().name().to_string()
    }

    pub fn input(&self) -> MessageDescriptor {
        self.method.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.method.output()
    }

    pub fn is_streaming(&self) -> bool {
        self.method.is_client_streaming() || self.method.is_server_streaming()
    }

    /// gRPC request path, `/<service>/<method>`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service_full_name(), self.method_name())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Top-level input fields flagged `field_required`, oneof members excluded.
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    pub fn auto_discovery(&self) -> AutoDiscoveryFlags {
        self.auto_discovery
    }

    pub fn service_tags(&self) -> &[String] {
        &self.service_tags
    }

    pub fn method_tags(&self) -> &[String] {
        &self.method_tags
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    /// Tool name: the `method_name` option, else `<service full name>.<method>`.
    pub fn tool_name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => format!("{}.{}", self.service_full_name(), self.method_name()),
        }
    }

    /// Tool description: the `method_desc` option, else the humanized tool name.
    pub fn tool_description(&self) -> String {
        match &self.description {
            Some(desc) => desc.clone(),
            None => naming::humanize(&self.tool_name()),
        }
    }
}
