//! JSON Schema synthesis from message descriptors.
//!
//! Produces a draft-07 document describing the JSON form a tool caller must
//! send. Oneofs are expressed as schema compositions so that mutual
//! exclusivity can be checked by any validator.

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, MethodDescriptor, OneofDescriptor};
use serde_json::{json, Map, Value};

use crate::options;

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Build the schema document for a message type.
pub fn synthesize(message: &MessageDescriptor) -> Value {
    let mut root = Map::new();
    root.insert("$schema".to_string(), json!(DRAFT_07));
    root.insert("title".to_string(), json!(message.name()));
    let mut stack = Vec::new();
    message_schema(message, &mut root, &mut stack);
    Value::Object(root)
}

/// Schema of the method's request type.
pub fn input_schema(method: &MethodDescriptor) -> Value {
    synthesize(&method.input())
}

/// Schema of the method's response type.
pub fn output_schema(method: &MethodDescriptor) -> Value {
    synthesize(&method.output())
}

/// The oneof a field belongs to, ignoring the synthetic oneofs generated for
/// proto3 `optional` fields.
pub(crate) fn real_oneof(field: &FieldDescriptor) -> Option<OneofDescriptor> {
    field.containing_oneof().filter(|oneof| !oneof.is_synthetic())
}

fn message_schema(
    message: &MessageDescriptor,
    node: &mut Map<String, Value>,
    stack: &mut Vec<String>,
) {
    node.insert("type".to_string(), json!("object"));
    if stack.iter().any(|name| name == message.full_name()) {
        return;
    }
    stack.push(message.full_name().to_string());

    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in message.fields() {
        let in_oneof = real_oneof(&field).is_some();
        if !in_oneof && options::field_required(&field) {
            required.push(json!(field.name()));
        }
        properties.insert(field.name().to_string(), field_schema(&field, stack));
    }

    let compositions: Vec<Value> = message
        .oneofs()
        .filter(|oneof| !oneof.is_synthetic())
        .map(|oneof| oneof_branches(&oneof))
        .collect();

    node.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        node.insert("required".to_string(), Value::Array(required));
    }
    match compositions.len() {
        0 => {}
        1 => {
            if let Some(branches) = compositions.into_iter().next() {
                node.insert("oneOf".to_string(), branches);
            }
        }
        _ => {
            let all_of = compositions
                .into_iter()
                .map(|branches| json!({ "oneOf": branches }))
                .collect();
            node.insert("allOf".to_string(), Value::Array(all_of));
        }
    }

    stack.pop();
}

/// One `required` branch per member, plus a branch matching none of them.
fn oneof_branches(oneof: &OneofDescriptor) -> Value {
    let mut branches: Vec<Value> = oneof
        .fields()
        .map(|field| json!({ "required": [field.name()] }))
        .collect();
    let none = json!({ "not": { "anyOf": branches.clone() } });
    branches.push(none);
    Value::Array(branches)
}

fn field_schema(field: &FieldDescriptor, stack: &mut Vec<String>) -> Value {
    let mut node = Map::new();
    if let Some(desc) = options::field_desc(field) {
        node.insert("description".to_string(), json!(desc));
    }

    if field.is_list() {
        node.insert("type".to_string(), json!("array"));
        let mut items = Map::new();
        kind_schema(&field.kind(), &mut items, stack);
        node.insert("items".to_string(), Value::Object(items));
    } else if field.is_map() {
        node.insert("type".to_string(), json!("object"));
        let mut value_node = Map::new();
        if let Kind::Message(entry) = field.kind() {
            kind_schema(&entry.map_entry_value_field().kind(), &mut value_node, stack);
        }
        node.insert("additionalProperties".to_string(), Value::Object(value_node));
        node.insert("properties".to_string(), Value::Object(Map::new()));
    } else {
        kind_schema(&field.kind(), &mut node, stack);
    }
    Value::Object(node)
}

fn kind_schema(kind: &Kind, node: &mut Map<String, Value>, stack: &mut Vec<String>) {
    match kind {
        Kind::String => {
            node.insert("type".to_string(), json!("string"));
        }
        Kind::Bool => {
            node.insert("type".to_string(), json!("boolean"));
        }
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Fixed32
        | Kind::Fixed64
        | Kind::Sfixed32
        | Kind::Sfixed64 => {
            node.insert("type".to_string(), json!("integer"));
        }
        Kind::Float | Kind::Double => {
            node.insert("type".to_string(), json!("number"));
        }
        Kind::Bytes => {
            node.insert("type".to_string(), json!("string"));
            node.insert("contentEncoding".to_string(), json!("base64"));
        }
        Kind::Enum(enum_desc) => {
            let names: Vec<Value> = enum_desc.values().map(|v| json!(v.name())).collect();
            node.insert("type".to_string(), json!("string"));
            node.insert("enum".to_string(), Value::Array(names));
        }
        Kind::Message(message) => message_schema(message, node, stack),
    }
}
