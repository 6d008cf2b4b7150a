//! Fixture services for tests.
//!
//! `tonic_reflection::server` re-encodes files through `prost-types`, which
//! loses custom options. [`FixtureReflection`] answers with the files exactly
//! as `protoc` produced them.

use std::{collections::HashSet, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use indexmap::IndexMap;
use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::{
    wrappers::{ReceiverStream, TcpListenerStream},
    StreamExt,
};
use tonic::{Request, Response, Status, Streaming};
use tonic_reflection::pb::v1::{
    server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
    server_reflection_server::{ServerReflection, ServerReflectionServer},
    ErrorResponse, FileDescriptorResponse, ListServiceResponse, ServerReflectionRequest,
    ServerReflectionResponse, ServiceResponse,
};

use crate::{descriptor, error::BridgeResult};

#[allow(clippy::all, non_camel_case_types, unused_qualifications)]
pub mod upper_case {
    tonic::include_proto!("_");
}

#[allow(clippy::all, non_camel_case_types, unused_qualifications)]
pub mod fixtures {
    tonic::include_proto!("smg.tool.testing");
}

/// Encoded `FileDescriptorSet` of every fixture file and its imports.
pub const DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("testing_descriptor");

pub const UPPER_CASE_FILE: &str = "testing/upper_case.proto";
pub const MESSAGES_FILE: &str = "testing/messages.proto";
pub const DISCOVERY_FILE: &str = "testing/discovery.proto";
pub const DISCOVERY2_FILE: &str = "testing/discovery2.proto";

const REFLECTION_SERVICE: &str = "grpc.reflection.v1.ServerReflection";

/// Upper-cases the request message.
#[derive(Debug, Clone, Default)]
pub struct UpperCaseService;

#[tonic::async_trait]
impl upper_case::upper_case_server::UpperCase for UpperCaseService {
    async fn to_upper_case(
        &self,
        request: Request<upper_case::UpperCaseRequest>,
    ) -> Result<Response<upper_case::UpperCaseResponse>, Status> {
        let message = request.into_inner().message.to_uppercase();
        Ok(Response::new(upper_case::UpperCaseResponse { message }))
    }
}

struct FixtureFile {
    bytes: Bytes,
    dependencies: Vec<String>,
    symbols: Vec<String>,
    services: Vec<String>,
}

/// Reflection server over a raw descriptor set.
#[derive(Clone)]
pub struct FixtureReflection {
    files: Arc<IndexMap<String, FixtureFile>>,
    services: Vec<String>,
    send_dependencies: bool,
}

impl FixtureReflection {
    /// Serve `set`, listing the services of every file in it.
    pub fn new(set: &[u8]) -> BridgeResult<Self> {
        let mut files = IndexMap::new();
        for bytes in descriptor::split(set)? {
            let proto = prost_types::FileDescriptorProto::decode(bytes.clone())?;
            let prefix = match proto.package() {
                "" => String::new(),
                package => format!("{package}."),
            };
            let services: Vec<String> = proto
                .service
                .iter()
                .map(|s| format!("{prefix}{}", s.name()))
                .collect();
            let mut symbols = services.clone();
            symbols.extend(
                proto
                    .message_type
                    .iter()
                    .map(|m| format!("{prefix}{}", m.name())),
            );
            files.insert(
                proto.name().to_string(),
                FixtureFile {
                    bytes,
                    dependencies: proto.dependency.clone(),
                    symbols,
                    services,
                },
            );
        }
        let services = files.values().flat_map(|f| f.services.clone()).collect();
        Ok(Self {
            files: Arc::new(files),
            services,
            send_dependencies: true,
        })
    }

    /// Restrict `list_services` to the services declared in `filenames`.
    #[must_use]
    pub fn serving(mut self, filenames: &[&str]) -> Self {
        self.services = filenames
            .iter()
            .filter_map(|name| self.files.get(*name))
            .flat_map(|f| f.services.clone())
            .collect();
        self
    }

    /// Answer file requests with the requested file only, leaving the client
    /// to ask for each dependency by name.
    #[must_use]
    pub fn without_dependencies(mut self) -> Self {
        self.send_dependencies = false;
        self
    }

    fn respond(&self, request: Option<MessageRequest>) -> MessageResponse {
        match request {
            Some(MessageRequest::ListServices(_)) => {
                let mut service: Vec<ServiceResponse> = self
                    .services
                    .iter()
                    .map(|name| ServiceResponse { name: name.clone() })
                    .collect();
                service.push(ServiceResponse {
                    name: REFLECTION_SERVICE.to_string(),
                });
                MessageResponse::ListServicesResponse(ListServiceResponse { service })
            }
            Some(MessageRequest::FileByFilename(name)) => self.file_response(&name),
            Some(MessageRequest::FileContainingSymbol(symbol)) => {
                match self
                    .files
                    .iter()
                    .find(|(_, f)| f.symbols.iter().any(|s| *s == symbol))
                {
                    Some((name, _)) => self.file_response(name),
                    None => not_found(&format!("symbol not found: {symbol}")),
                }
            }
            _ => MessageResponse::ErrorResponse(ErrorResponse {
                error_code: tonic::Code::Unimplemented as i32,
                error_message: "unsupported reflection request".to_string(),
            }),
        }
    }

    fn file_response(&self, name: &str) -> MessageResponse {
        if !self.files.contains_key(name) {
            return not_found(&format!("file not found: {name}"));
        }
        let mut ordered = Vec::new();
        if self.send_dependencies {
            self.collect(name, &mut HashSet::new(), &mut ordered);
        } else if let Some(file) = self.files.get(name) {
            ordered.push(file.bytes.to_vec());
        }
        MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
            file_descriptor_proto: ordered,
        })
    }

    /// Requested file first, then its transitive dependencies.
    fn collect(&self, name: &str, seen: &mut HashSet<String>, out: &mut Vec<Vec<u8>>) {
        if !seen.insert(name.to_string()) {
            return;
        }
        let Some(file) = self.files.get(name) else {
            return;
        };
        out.push(file.bytes.to_vec());
        for dependency in &file.dependencies {
            self.collect(dependency, seen, out);
        }
    }
}

fn not_found(message: &str) -> MessageResponse {
    MessageResponse::ErrorResponse(ErrorResponse {
        error_code: tonic::Code::NotFound as i32,
        error_message: message.to_string(),
    })
}

#[tonic::async_trait]
impl ServerReflection for FixtureReflection {
    type ServerReflectionInfoStream = ReceiverStream<Result<ServerReflectionResponse, Status>>;

    async fn server_reflection_info(
        &self,
        request: Request<Streaming<ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        let mut requests = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let server = self.clone();

        tokio::spawn(async move {
            while let Some(next) = requests.next().await {
                let reply = match next {
                    Ok(request) => {
                        let message_response = server.respond(request.message_request.clone());
                        Ok(ServerReflectionResponse {
                            valid_host: request.host.clone(),
                            original_request: Some(request),
                            message_response: Some(message_response),
                        })
                    }
                    Err(status) => Err(status),
                };
                if tx.send(reply).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Serve [`UpperCaseService`] and `reflection` on an ephemeral localhost port.
#[expect(clippy::expect_used, reason = "test helper: panic on failure is intentional")]
pub async fn serve(reflection: FixtureReflection) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fixture server");
    let addr = listener.local_addr().expect("Failed to read local address");
    let incoming = TcpListenerStream::new(listener);

    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(upper_case::upper_case_server::UpperCaseServer::new(
                UpperCaseService,
            ))
            .add_service(ServerReflectionServer::new(reflection))
            .serve_with_incoming(incoming)
            .await
            .expect("Fixture server failed");
    });

    addr
}
