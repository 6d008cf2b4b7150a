//! Client side of `grpc.reflection.v1` used for auto-discovery.
//!
//! All requests of one discovery pass share a single bidirectional stream and
//! only one request is in flight at a time.

use std::collections::{BTreeMap, VecDeque};

use bytes::Bytes;
use indexmap::IndexMap;
use prost::Message;
use prost_reflect::FileDescriptor;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Streaming;
use tonic_reflection::pb::v1::{
    server_reflection_client::ServerReflectionClient,
    server_reflection_request::MessageRequest, server_reflection_response::MessageResponse,
    ServerReflectionRequest, ServerReflectionResponse,
};
use tracing::debug;

use crate::{
    channel::BridgeChannel,
    descriptor,
    error::{BridgeError, BridgeResult},
};

const REFLECTION_PACKAGE_PREFIX: &str = "grpc.reflection.";

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Services listed by the server, the reflection service excluded.
    pub services: Vec<String>,
    /// Every file loaded to describe them, dependencies included.
    pub files: BTreeMap<String, FileDescriptor>,
}

pub struct ReflectionClient {
    requests: mpsc::Sender<ServerReflectionRequest>,
    responses: Streaming<ServerReflectionResponse>,
}

impl ReflectionClient {
    /// Open the reflection stream on `channel`.
    pub async fn connect(channel: &BridgeChannel) -> BridgeResult<Self> {
        let (requests, rx) = mpsc::channel(1);
        let mut client = ServerReflectionClient::new(channel.channel()?);
        if let Some(limit) = channel.max_decoding_message_size() {
            client = client.max_decoding_message_size(limit);
        }
        let responses = client
            .server_reflection_info(ReceiverStream::new(rx))
            .await?
            .into_inner();
        Ok(Self {
            requests,
            responses,
        })
    }

    async fn exchange(&mut self, request: MessageRequest) -> BridgeResult<MessageResponse> {
        self.requests
            .send(ServerReflectionRequest {
                host: String::new(),
                message_request: Some(request),
            })
            .await
            .map_err(|_| BridgeError::Reflection("reflection stream closed".to_string()))?;

        let response = self
            .responses
            .message()
            .await?
            .ok_or_else(|| BridgeError::Reflection("reflection stream ended".to_string()))?;
        match response.message_response {
            Some(MessageResponse::ErrorResponse(error)) => Err(BridgeError::Reflection(format!(
                "{} (code {})",
                error.error_message, error.error_code
            ))),
            Some(message) => Ok(message),
            None => Err(BridgeError::Reflection("empty reflection response".to_string())),
        }
    }

    pub async fn list_services(&mut self) -> BridgeResult<Vec<String>> {
        match self.exchange(MessageRequest::ListServices(String::new())).await? {
            MessageResponse::ListServicesResponse(list) => {
                Ok(list.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(unexpected("list_services", &other)),
        }
    }

    pub async fn file_containing_symbol(&mut self, symbol: &str) -> BridgeResult<Vec<Bytes>> {
        let response = self
            .exchange(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;
        file_protos("file_containing_symbol", response)
    }

    pub async fn file_by_filename(&mut self, filename: &str) -> BridgeResult<Vec<Bytes>> {
        let response = self
            .exchange(MessageRequest::FileByFilename(filename.to_string()))
            .await?;
        file_protos("file_by_filename", response)
    }

    /// Resolve every service the server exposes into loaded file descriptors.
    ///
    /// Files are requested per pending service; services declared by files
    /// that are already loaded are not requested again.
    pub async fn discover(&mut self) -> BridgeResult<Discovered> {
        let services: Vec<String> = self
            .list_services()
            .await?
            .into_iter()
            .filter(|name| !name.starts_with(REFLECTION_PACKAGE_PREFIX))
            .collect();
        debug!(services = services.len(), "Listed services over reflection");
        let mut pending: VecDeque<String> = services.iter().cloned().collect();

        let mut raw: IndexMap<String, RawProto> = IndexMap::new();
        let mut loaded = BTreeMap::new();
        while let Some(service) = pending.pop_front() {
            for bytes in self.file_containing_symbol(&service).await? {
                insert_raw(&mut raw, bytes)?;
            }
            self.fetch_missing_dependencies(&mut raw).await?;

            loaded = descriptor::load_files(raw.values().map(|p| p.bytes.clone()).collect())?;
            for file in loaded.values() {
                for declared in file.services() {
                    pending.retain(|name| name != declared.full_name());
                }
            }
        }
        Ok(Discovered {
            services,
            files: loaded,
        })
    }

    /// Servers may omit files already sent earlier on the stream.
    async fn fetch_missing_dependencies(
        &mut self,
        raw: &mut IndexMap<String, RawProto>,
    ) -> BridgeResult<()> {
        loop {
            let missing: Vec<String> = raw
                .values()
                .flat_map(|proto| proto.dependencies.iter())
                .filter(|dep| !raw.contains_key(*dep))
                .cloned()
                .collect();
            if missing.is_empty() {
                return Ok(());
            }
            for filename in missing {
                if raw.contains_key(&filename) {
                    continue;
                }
                debug!(file = %filename, "Fetching missing dependency over reflection");
                let fetched = self.file_by_filename(&filename).await?;
                for bytes in fetched {
                    insert_raw(raw, bytes)?;
                }
                if !raw.contains_key(&filename) {
                    return Err(BridgeError::FileNotFound(filename));
                }
            }
        }
    }
}

struct RawProto {
    bytes: Bytes,
    dependencies: Vec<String>,
}

fn insert_raw(raw: &mut IndexMap<String, RawProto>, bytes: Bytes) -> BridgeResult<()> {
    let proto = prost_types::FileDescriptorProto::decode(bytes.clone())?;
    let name = proto.name.unwrap_or_default();
    raw.entry(name).or_insert(RawProto {
        bytes,
        dependencies: proto.dependency,
    });
    Ok(())
}

fn file_protos(request: &str, response: MessageResponse) -> BridgeResult<Vec<Bytes>> {
    match response {
        MessageResponse::FileDescriptorResponse(files) => Ok(files
            .file_descriptor_proto
            .into_iter()
            .map(Bytes::from)
            .collect()),
        other => Err(unexpected(request, &other)),
    }
}

fn unexpected(request: &str, response: &MessageResponse) -> BridgeError {
    let kind = match response {
        MessageResponse::FileDescriptorResponse(_) => "file_descriptor_response",
        MessageResponse::AllExtensionNumbersResponse(_) => "all_extension_numbers_response",
        MessageResponse::ListServicesResponse(_) => "list_services_response",
        MessageResponse::ErrorResponse(_) => "error_response",
    };
    BridgeError::Reflection(format!("unexpected {kind} to {request}"))
}
