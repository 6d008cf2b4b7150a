//! Response rendering over the compiled fixture descriptors.

use prost_reflect::DynamicMessage;
use serde_json::{json, Value};
use smg_grpc_bridge::{descriptor, format, testing};

fn message(file: &str, name: &str, value: Value) -> DynamicMessage {
    let files = descriptor::load(testing::DESCRIPTOR_SET).unwrap();
    let desc = files[file]
        .parent_pool()
        .get_message_by_name(name)
        .unwrap();
    DynamicMessage::deserialize(desc, value).unwrap()
}

fn all_types(value: Value) -> DynamicMessage {
    message(testing::MESSAGES_FILE, "smg.tool.testing.AllTypes", value)
}

#[test]
fn test_single_scalar_collapses_to_bare_value() {
    let response = message(
        testing::UPPER_CASE_FILE,
        "UpperCaseResponse",
        json!({"message": "HI"}),
    );
    assert_eq!(format::format(&response), "HI");
}

#[test]
fn test_empty_message_renders_empty() {
    let response = all_types(json!({}));
    assert_eq!(format::format(&response), "");
}

#[test]
fn test_flat_scalars_are_labelled_and_quoted() {
    let request = message(
        testing::MESSAGES_FILE,
        "smg.tool.testing.TestRequest",
        json!({"query": "rust", "limit": 5}),
    );
    assert_eq!(format::format(&request), "Search query: 'rust'\nlimit: 5");
}

#[test]
fn test_defaults_are_skipped() {
    let value = all_types(json!({"count": 3, "color": "COLOR_RED", "active": false}));
    assert_eq!(format::format(&value), "count: 3\ncolor: COLOR_RED");
}

#[test]
fn test_repeated_scalars_are_numbered() {
    let response = message(
        testing::MESSAGES_FILE,
        "smg.tool.testing.TestResponse",
        json!({"results": ["a", "b"]}),
    );
    assert_eq!(format::format(&response), "1. results: ['a', 'b']");
}

#[test]
fn test_nested_and_repeated_messages_are_indented_blocks() {
    let value = all_types(json!({
        "name": "box",
        "address": {"city": "Paris"},
        "history": [{"street": "A"}, {"street": "B"}]
    }));
    let expected = [
        "1. Display name: 'box'",
        "2. address: ",
        "  2.1. City name: 'Paris'",
        "3. history: ",
        "  3.1. ",
        "    3.1.1. street: 'A'",
        "  3.2. ",
        "    3.2.1. street: 'B'",
    ]
    .join("\n");
    assert_eq!(format::format(&value), expected);
}

#[test]
fn test_maps() {
    let scalars = all_types(json!({"counters": {"b": 2, "a": 1}}));
    assert_eq!(format::format(&scalars), "1. counters: {a: 1, b: 2}");

    let messages = all_types(json!({"locations": {"home": {"city": "Oslo"}}}));
    let expected = [
        "1. locations: ",
        "  1.1. home: ",
        "    1.1.1. City name: 'Oslo'",
    ]
    .join("\n");
    assert_eq!(format::format(&messages), expected);
}

#[test]
fn test_bytes_render_as_text() {
    // "aGk=" is base64 for "hi"
    let value = all_types(json!({"payload": "aGk=", "active": true}));
    assert_eq!(format::format(&value), "active: true\npayload: 'hi'");
}

#[test]
fn test_to_json_is_canonical() {
    let response = message(
        testing::UPPER_CASE_FILE,
        "UpperCaseResponse",
        json!({"message": "HI"}),
    );
    assert_eq!(format::to_json(&response).unwrap(), r#"{"message":"HI"}"#);
}
