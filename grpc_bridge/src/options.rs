//! Readers for the `smg.tool.v1` option extensions.
//!
//! Extensions are resolved by name in the descriptor's own pool, so a file
//! that never imports `tool_options.proto` simply reports every option unset.

use prost_reflect::{
    DescriptorPool, DynamicMessage, FieldDescriptor, FileDescriptor, MethodDescriptor,
    ReflectMessage, ServiceDescriptor, Value,
};

/// Protobuf package declaring the tool option extensions.
pub const OPTIONS_PACKAGE: &str = "smg.tool.v1";

pub const FILE_AUTO_DISCOVERY: &str = "file_auto_discovery";
pub const SERVICE_AUTO_DISCOVERY: &str = "service_auto_discovery";
pub const GROUP_NAME: &str = "group_name";
pub const SERVICE_TAGS: &str = "service_tags";
pub const METHOD_AUTO_DISCOVERY: &str = "method_auto_discovery";
pub const METHOD_NAME: &str = "method_name";
pub const METHOD_DESC: &str = "method_desc";
pub const METHOD_TAGS: &str = "method_tags";
pub const FIELD_DESC: &str = "field_desc";
pub const FIELD_REQUIRED: &str = "field_required";

fn extension(pool: &DescriptorPool, options: &DynamicMessage, name: &str) -> Option<Value> {
    let ext = pool.get_extension_by_name(&format!("{OPTIONS_PACKAGE}.{name}"))?;
    if ext.containing_message() != options.descriptor() || !options.has_extension(&ext) {
        return None;
    }
    Some(options.get_extension(&ext).into_owned())
}

fn bool_extension(pool: &DescriptorPool, options: &DynamicMessage, name: &str) -> Option<bool> {
    extension(pool, options, name).and_then(|v| v.as_bool())
}

fn string_extension(pool: &DescriptorPool, options: &DynamicMessage, name: &str) -> Option<String> {
    extension(pool, options, name).and_then(|v| v.as_str().map(str::to_owned))
}

fn list_extension(pool: &DescriptorPool, options: &DynamicMessage, name: &str) -> Vec<String> {
    extension(pool, options, name)
        .and_then(|v| {
            v.as_list().map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_owned))
                    .collect()
            })
        })
        .unwrap_or_default()
}

pub fn file_auto_discovery(file: &FileDescriptor) -> Option<bool> {
    bool_extension(file.parent_pool(), &file.options(), FILE_AUTO_DISCOVERY)
}

pub fn service_auto_discovery(service: &ServiceDescriptor) -> Option<bool> {
    bool_extension(service.parent_pool(), &service.options(), SERVICE_AUTO_DISCOVERY)
}

pub fn group_name(service: &ServiceDescriptor) -> Option<String> {
    string_extension(service.parent_pool(), &service.options(), GROUP_NAME)
}

pub fn service_tags(service: &ServiceDescriptor) -> Vec<String> {
    list_extension(service.parent_pool(), &service.options(), SERVICE_TAGS)
}

pub fn method_auto_discovery(method: &MethodDescriptor) -> Option<bool> {
    bool_extension(method.parent_pool(), &method.options(), METHOD_AUTO_DISCOVERY)
}

pub fn method_name(method: &MethodDescriptor) -> Option<String> {
    string_extension(method.parent_pool(), &method.options(), METHOD_NAME)
}

pub fn method_desc(method: &MethodDescriptor) -> Option<String> {
    string_extension(method.parent_pool(), &method.options(), METHOD_DESC)
}

pub fn method_tags(method: &MethodDescriptor) -> Vec<String> {
    list_extension(method.parent_pool(), &method.options(), METHOD_TAGS)
}

pub fn field_desc(field: &FieldDescriptor) -> Option<String> {
    string_extension(field.parent_pool(), &field.options(), FIELD_DESC)
}

/// Unset counts as not required.
pub fn field_required(field: &FieldDescriptor) -> bool {
    bool_extension(field.parent_pool(), &field.options(), FIELD_REQUIRED).unwrap_or(false)
}
