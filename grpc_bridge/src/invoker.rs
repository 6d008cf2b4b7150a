//! Dynamic invocation of unary RPC methods with JSON input.

use http::uri::PathAndQuery;
use prost_reflect::{DeserializeOptions, DynamicMessage};
use serde::Serialize;
use serde_json::Value;
use tonic::{client::Grpc, Request, Status};
use tracing::debug;

use crate::{
    channel::BridgeChannel,
    codec::DynamicCodec,
    context::ToolContext,
    error::{BridgeError, BridgeResult},
    format, schema,
    signature::MethodSignature,
};

/// What a tool calling layer sees of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub return_direct: bool,
}

/// A unary method bound to a channel, callable with JSON input.
#[derive(Debug, Clone)]
pub struct DynamicInvoker {
    signature: MethodSignature,
    channel: BridgeChannel,
    tags: Vec<String>,
    return_direct: bool,
}

impl DynamicInvoker {
    /// Fails with [`BridgeError::UnsupportedMethod`] for streaming methods.
    pub fn new(signature: MethodSignature, channel: BridgeChannel) -> BridgeResult<Self> {
        if signature.is_streaming() {
            return Err(BridgeError::UnsupportedMethod(
                signature.descriptor().full_name().to_string(),
            ));
        }
        Ok(Self {
            signature,
            channel,
            tags: Vec::new(),
            return_direct: false,
        })
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_return_direct(mut self, return_direct: bool) -> Self {
        self.return_direct = return_direct;
        self
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn name(&self) -> String {
        self.signature.tool_name()
    }

    pub fn description(&self) -> String {
        self.signature.tool_description()
    }

    pub fn input_schema(&self) -> Value {
        schema::synthesize(&self.signature.input())
    }

    pub fn output_schema(&self) -> Value {
        schema::synthesize(&self.signature.output())
    }

    pub fn return_direct(&self) -> bool {
        self.return_direct
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
            return_direct: self.return_direct,
        }
    }

    /// Parse tool input into a request message. Unknown fields are dropped.
    pub fn parse_input(&self, json: &str) -> BridgeResult<DynamicMessage> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let message = DynamicMessage::deserialize_with_options(
            self.signature.input(),
            &mut deserializer,
            &DeserializeOptions::new().deny_unknown_fields(false),
        )
        .map_err(BridgeError::InvalidInput)?;
        deserializer.end().map_err(BridgeError::InvalidInput)?;
        Ok(message)
    }

    /// Send one unary request and wait for the response.
    pub async fn call(&self, json: &str) -> BridgeResult<DynamicMessage> {
        self.call_with_context(json, &ToolContext::default()).await
    }

    pub async fn call_with_context(
        &self,
        json: &str,
        context: &ToolContext,
    ) -> BridgeResult<DynamicMessage> {
        let message = self.parse_input(json)?;
        let mut request = Request::new(message);
        context.inject(request.metadata_mut())?;

        let path = PathAndQuery::try_from(self.signature.path())
            .map_err(|e| Status::internal(format!("invalid method path: {e}")))?;
        let codec = DynamicCodec::new(self.signature.output());

        let mut grpc = Grpc::new(self.channel.channel()?);
        if let Some(limit) = self.channel.max_decoding_message_size() {
            grpc = grpc.max_decoding_message_size(limit);
        }
        grpc.ready().await?;

        debug!(tool = %self.name(), path = %path, "Invoking tool");
        let response = grpc.unary(request, path, codec).await?;
        Ok(response.into_inner())
    }

    /// [`call`](Self::call) followed by [`format::format`].
    pub async fn call_to_string(&self, json: &str) -> BridgeResult<String> {
        let response = self.call(json).await?;
        Ok(format::format(&response))
    }
}
