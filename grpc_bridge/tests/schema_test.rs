//! Schema synthesis over the compiled fixture descriptors.

use prost_reflect::MessageDescriptor;
use serde_json::json;
use smg_grpc_bridge::{descriptor, schema, testing};

fn message(name: &str) -> MessageDescriptor {
    let files = descriptor::load(testing::DESCRIPTOR_SET).unwrap();
    files[testing::MESSAGES_FILE]
        .parent_pool()
        .get_message_by_name(&format!("smg.tool.testing.{name}"))
        .unwrap()
}

#[test]
fn test_root_carries_draft_and_title() {
    let schema = schema::synthesize(&message("TestRequest"));
    assert_eq!(schema["$schema"], schema::DRAFT_07);
    assert_eq!(schema["title"], "TestRequest");
    assert_eq!(schema["type"], "object");
    assert_eq!(
        schema["properties"]["query"],
        json!({"description": "Search query", "type": "string"})
    );
    assert_eq!(schema["properties"]["limit"], json!({"type": "integer"}));
    assert_eq!(schema["required"], json!(["query"]));
}

#[test]
fn test_all_field_kinds() {
    let schema = schema::synthesize(&message("AllTypes"));
    let props = &schema["properties"];

    assert_eq!(props["name"]["description"], "Display name");
    assert_eq!(props["active"], json!({"type": "boolean"}));
    for integer in ["count", "total", "delta", "checksum"] {
        assert_eq!(props[integer], json!({"type": "integer"}), "{integer}");
    }
    assert_eq!(props["ratio"], json!({"type": "number"}));
    assert_eq!(props["score"], json!({"type": "number"}));
    assert_eq!(
        props["payload"],
        json!({"type": "string", "contentEncoding": "base64"})
    );
    assert_eq!(
        props["color"],
        json!({"type": "string", "enum": ["COLOR_UNSPECIFIED", "COLOR_RED", "COLOR_GREEN"]})
    );
    assert_eq!(
        props["address"],
        json!({
            "type": "object",
            "properties": {
                "city": {"description": "City name", "type": "string"},
                "street": {"type": "string"}
            }
        })
    );
    assert_eq!(
        props["labels"],
        json!({"type": "array", "items": {"type": "string"}})
    );
    assert_eq!(props["history"]["type"], "array");
    assert_eq!(props["history"]["items"]["type"], "object");
    assert_eq!(
        props["counters"],
        json!({"type": "object", "additionalProperties": {"type": "integer"}, "properties": {}})
    );
    assert_eq!(
        props["locations"]["additionalProperties"]["properties"]["street"],
        json!({"type": "string"})
    );
    // proto3 optional is a plain property
    assert_eq!(props["nickname"], json!({"type": "string"}));
}

#[test]
fn test_oneof_members_are_properties_but_not_required() {
    let schema = schema::synthesize(&message("AllTypes"));
    assert!(schema["properties"].get("email").is_some());
    assert!(schema["properties"].get("phone").is_some());
    assert_eq!(schema["required"], json!(["name"]));

    let branches = json!([
        {"required": ["email"]},
        {"required": ["phone"]},
    ]);
    assert_eq!(
        schema["oneOf"],
        json!([
            {"required": ["email"]},
            {"required": ["phone"]},
            {"not": {"anyOf": branches}}
        ])
    );
    assert!(schema.get("allOf").is_none());
}

#[test]
fn test_multiple_oneofs_compose_independently() {
    let schema = schema::synthesize(&message("TwoChoices"));
    assert!(schema.get("oneOf").is_none());
    assert!(schema.get("required").is_none());

    let all_of = schema["allOf"].as_array().unwrap();
    assert_eq!(all_of.len(), 2);
    assert_eq!(
        all_of[0]["oneOf"],
        json!([
            {"required": ["a"]},
            {"required": ["b"]},
            {"not": {"anyOf": [{"required": ["a"]}, {"required": ["b"]}]}}
        ])
    );
    assert_eq!(all_of[1]["oneOf"][0], json!({"required": ["c"]}));
    assert_eq!(all_of[1]["oneOf"][1], json!({"required": ["d"]}));
}

#[test]
fn test_recursive_message_stops_at_stack() {
    let schema = schema::synthesize(&message("AllTypes"));
    let tree = &schema["properties"]["tree"];
    assert_eq!(tree["type"], "object");
    assert_eq!(tree["properties"]["label"], json!({"type": "string"}));
    assert_eq!(
        tree["properties"]["children"],
        json!({"type": "array", "items": {"type": "object"}})
    );
}

#[test]
fn test_synthesis_is_deterministic() {
    let all_types = message("AllTypes");
    let first = serde_json::to_string(&schema::synthesize(&all_types)).unwrap();
    let second = serde_json::to_string(&schema::synthesize(&all_types)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_method_schemas() {
    let files = descriptor::load(testing::DESCRIPTOR_SET).unwrap();
    let service = files[testing::UPPER_CASE_FILE]
        .services()
        .next()
        .unwrap();
    let method = service.methods().next().unwrap();

    let input = schema::input_schema(&method);
    assert_eq!(input["title"], "UpperCaseRequest");
    assert_eq!(input["required"], json!(["message"]));
    assert_eq!(input["properties"]["message"], json!({"type": "string"}));

    let output = schema::output_schema(&method);
    assert_eq!(output["title"], "UpperCaseResponse");
    assert!(output.get("required").is_none());
}

fn validator(name: &str) -> jsonschema::Validator {
    jsonschema::validator_for(&schema::synthesize(&message(name))).unwrap()
}

fn populated_all_types() -> serde_json::Value {
    json!({
        "name": "box",
        "active": true,
        "count": -3,
        "total": 5,
        "delta": -1,
        "checksum": 42,
        "ratio": 0.5,
        "score": 1.5,
        "payload": "aGk=",
        "color": "COLOR_RED",
        "address": {"city": "Paris", "street": "Rue"},
        "labels": ["a", "b"],
        "history": [{"street": "A"}, {"street": "B"}],
        "counters": {"a": 1, "b": 2},
        "locations": {"home": {"city": "Lyon"}},
        "nickname": "bx",
        "tree": {"label": "root", "children": [{"label": "leaf"}]},
        "email": "box@example.com"
    })
}

#[test]
fn test_populated_message_validates() {
    let instance = populated_all_types();
    let parsed = prost_reflect::DynamicMessage::deserialize(
        message("AllTypes"),
        instance.clone(),
    );
    assert!(parsed.is_ok(), "instance is not a valid AllTypes message");
    assert!(validator("AllTypes").is_valid(&instance));
}

#[test]
fn test_oneof_exclusivity_is_enforced() {
    let all_types = validator("AllTypes");

    let mut none = populated_all_types();
    none.as_object_mut().unwrap().remove("email");
    assert!(all_types.is_valid(&none));

    let mut both = populated_all_types();
    both["phone"] = json!("555-0100");
    assert!(!all_types.is_valid(&both));

    let mut missing_required = populated_all_types();
    missing_required.as_object_mut().unwrap().remove("name");
    assert!(!all_types.is_valid(&missing_required));
}

#[test]
fn test_each_oneof_is_exclusive_on_its_own() {
    let two_choices = validator("TwoChoices");
    assert!(two_choices.is_valid(&json!({})));
    assert!(two_choices.is_valid(&json!({"a": "x", "c": true})));
    assert!(two_choices.is_valid(&json!({"b": 1, "d": 2.5})));
    assert!(!two_choices.is_valid(&json!({"a": "x", "b": 1})));
    assert!(!two_choices.is_valid(&json!({"c": true, "d": 2.5})));
}
