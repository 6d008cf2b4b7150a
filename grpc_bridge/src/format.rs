//! Human readable rendering of response messages.
//!
//! Fields print in declaration order and default values are skipped. Nested
//! and repeated messages become indented blocks numbered by their position
//! (`1.`, `1.1.`, ...). A response with a single populated scalar field prints
//! just that value.

use std::fmt::Write;

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, ReflectMessage, Value};

use crate::{error::BridgeResult, options};

const INDENT: &str = "  ";

/// Render `message` for a tool caller.
pub fn format(message: &DynamicMessage) -> String {
    let populated = populated_fields(message);
    let numbered = populated.iter().any(|(field, _)| is_composite(field));
    if !numbered && populated.len() == 1 {
        if let Some((field, value)) = populated.first() {
            return scalar_text(&field.kind(), value, false);
        }
    }

    let mut out = String::new();
    let mut level = Vec::new();
    write_message(message, &mut out, &mut level, numbered);
    out.trim_start_matches('\n').to_string()
}

/// Canonical protobuf JSON rendering.
pub fn to_json(message: &DynamicMessage) -> BridgeResult<String> {
    Ok(serde_json::to_string(message)?)
}

fn populated_fields(message: &DynamicMessage) -> Vec<(FieldDescriptor, Value)> {
    message
        .descriptor()
        .fields()
        .filter_map(|field| {
            let value = message.get_field(&field);
            if value.is_default_for_field(&field) {
                None
            } else {
                Some((field, value.into_owned()))
            }
        })
        .collect()
}

fn is_composite(field: &FieldDescriptor) -> bool {
    field.is_list() || matches!(field.kind(), Kind::Message(_))
}

fn label(field: &FieldDescriptor) -> String {
    options::field_desc(field).unwrap_or_else(|| field.name().to_string())
}

fn write_prefix(level: &[usize], out: &mut String, numbered: bool) {
    out.push('\n');
    for _ in 1..level.len() {
        out.push_str(INDENT);
    }
    if numbered {
        for n in level {
            let _ = write!(out, "{n}.");
        }
        out.push(' ');
    }
}

fn bump(level: &mut [usize]) {
    if let Some(last) = level.last_mut() {
        *last += 1;
    }
}

fn write_message(
    message: &DynamicMessage,
    out: &mut String,
    level: &mut Vec<usize>,
    numbered: bool,
) {
    level.push(1);
    for (field, value) in populated_fields(message) {
        write_prefix(level, out, numbered);
        out.push_str(&label(&field));
        out.push_str(": ");
        write_value(&field, &value, out, level, numbered);
        bump(level);
    }
    level.pop();
}

fn write_value(
    field: &FieldDescriptor,
    value: &Value,
    out: &mut String,
    level: &mut Vec<usize>,
    numbered: bool,
) {
    match value {
        Value::List(items) => match field.kind() {
            Kind::Message(_) => {
                level.push(1);
                for item in items {
                    if let Value::Message(message) = item {
                        write_prefix(level, out, numbered);
                        write_message(message, out, level, numbered);
                    }
                    bump(level);
                }
                level.pop();
            }
            kind => {
                let rendered: Vec<String> =
                    items.iter().map(|item| scalar_text(&kind, item, true)).collect();
                out.push('[');
                out.push_str(&rendered.join(", "));
                out.push(']');
            }
        },
        Value::Map(entries) => {
            let value_kind = match field.kind() {
                Kind::Message(entry) => entry.map_entry_value_field().kind(),
                kind => kind,
            };
            let mut sorted: Vec<(&MapKey, &Value)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));

            if let Kind::Message(_) = value_kind {
                level.push(1);
                for (key, entry) in sorted {
                    write_prefix(level, out, numbered);
                    out.push_str(&map_key_text(key));
                    out.push_str(": ");
                    if let Value::Message(message) = entry {
                        write_message(message, out, level, numbered);
                    }
                    bump(level);
                }
                level.pop();
            } else {
                let rendered: Vec<String> = sorted
                    .into_iter()
                    .map(|(key, entry)| {
                        format!("{}: {}", map_key_text(key), scalar_text(&value_kind, entry, true))
                    })
                    .collect();
                out.push('{');
                out.push_str(&rendered.join(", "));
                out.push('}');
            }
        }
        Value::Message(message) => write_message(message, out, level, numbered),
        scalar => out.push_str(&scalar_text(&field.kind(), scalar, true)),
    }
}

fn map_key_text(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

fn scalar_text(kind: &Kind, value: &Value, quoted: bool) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::EnumNumber(number) => {
            let name = match kind {
                Kind::Enum(enum_desc) => enum_desc
                    .get_value(*number)
                    .map(|v| v.name().to_string()),
                _ => None,
            };
            return name.unwrap_or_else(|| number.to_string());
        }
        Value::Bool(v) => return v.to_string(),
        Value::I32(v) => return v.to_string(),
        Value::I64(v) => return v.to_string(),
        Value::U32(v) => return v.to_string(),
        Value::U64(v) => return v.to_string(),
        Value::F32(v) => return v.to_string(),
        Value::F64(v) => return v.to_string(),
        Value::Message(message) => return format(message),
        Value::List(_) | Value::Map(_) => return value.to_string(),
    };
    if quoted {
        format!("'{text}'")
    } else {
        text
    }
}
