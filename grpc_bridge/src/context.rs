//! Tool call context propagated as gRPC metadata.

use serde_json::{Map, Value};
use tonic::metadata::{MetadataMap, MetadataValue};

use crate::error::{BridgeError, BridgeResult};

/// Binary metadata key carrying the JSON encoded context.
pub const TOOL_CONTEXT_HEADER: &str = "tool-context-bin";

/// Caller supplied key/value context attached to a tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    entries: Map<String, Value>,
}

impl ToolContext {
    pub fn new(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    /// Parse a JSON object. Anything other than an object is rejected.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(BridgeError::InvalidContext(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the context into `metadata`. An empty context writes nothing.
    pub fn inject(&self, metadata: &mut MetadataMap) -> BridgeResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let encoded = serde_json::to_vec(&self.entries)?;
        metadata.insert_bin(TOOL_CONTEXT_HEADER, MetadataValue::from_bytes(&encoded));
        Ok(())
    }

    /// Read a context written by [`ToolContext::inject`], on the server side.
    pub fn extract(metadata: &MetadataMap) -> BridgeResult<Option<Self>> {
        let Some(value) = metadata.get_bin(TOOL_CONTEXT_HEADER) else {
            return Ok(None);
        };
        let bytes = value
            .to_bytes()
            .map_err(|e| BridgeError::InvalidContext(e.to_string()))?;
        let entries: Map<String, Value> = serde_json::from_slice(&bytes)?;
        Ok(Some(Self { entries }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_context_sends_nothing() {
        let mut metadata = MetadataMap::new();
        ToolContext::default().inject(&mut metadata).unwrap();
        assert!(metadata.get_bin(TOOL_CONTEXT_HEADER).is_none());
    }

    #[test]
    fn test_inject_then_extract() {
        let mut context = ToolContext::default();
        context.insert("user", json!("alice"));
        context.insert("turn", json!(3));

        let mut metadata = MetadataMap::new();
        context.inject(&mut metadata).unwrap();

        let extracted = ToolContext::extract(&metadata).unwrap().unwrap();
        assert_eq!(extracted.get("user"), Some(&json!("alice")));
        assert_eq!(extracted.get("turn"), Some(&json!(3)));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(ToolContext::from_json("[1, 2]").is_err());
        assert!(ToolContext::from_json(r#"{"k": "v"}"#).is_ok());
    }
}
