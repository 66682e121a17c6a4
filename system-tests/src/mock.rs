// system-tests/src/mock.rs
// ============================================================================
// Module: Mock gRPC Server
// Description: In-process gRPC server implementing the example API.
// Purpose: Give end-to-end scenarios a real server to reflect and call.
// Dependencies: prost, tokio, tokio-stream, tonic, tonic-reflection
// ============================================================================

//! ## Overview
//! [`MockServer`] serves `FooAPI`, `BarAPI`, and `StreamAPI` from the
//! `api.proto` fixture on a loopback port. Every reply echoes the request
//! message together with the incoming metadata:
//!
//! ```text
//! Incoming Message: <message>
//!  Metadata: map[key:[value] ...]
//! ```
//!
//! Reflection is served as v1, v1alpha, both, or not at all, selected by
//! [`Reflection`]. All methods share one message layout (`message = 1`), so
//! a single prost type encodes every request and response.
//!
//! Every `Collect` call records whether its request stream completed or
//! failed, readable through [`MockServer::collects`].
//!
//! ## Invariants
//! - Metadata keys render in sorted order.
//! - `Chat` answers each request as it arrives.
//! - `Ticks` emits [`TICK_COUNT`] responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;

use prost::Message;
use protoctl_schema::testing::example_descriptor_set;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tonic::codec::ProstCodec;
use tonic::codegen::Body;
use tonic::codegen::BoxFuture;
use tonic::codegen::Context;
use tonic::codegen::Poll;
use tonic::codegen::Service;
use tonic::codegen::StdError;
use tonic::codegen::empty_body;
use tonic::codegen::http;
use tonic::metadata::MetadataMap;
use tonic::server::ClientStreamingService;
use tonic::server::Grpc;
use tonic::server::NamedService;
use tonic::server::ServerStreamingService;
use tonic::server::StreamingService;
use tonic::server::UnaryService;
use tonic::transport::Server;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Path of `FooAPI.Hello`.
pub const HELLO_PATH: &str = "/example.FooAPI/Hello";
/// Path of `BarAPI.ListBars`.
pub const LIST_BARS_PATH: &str = "/example.BarAPI/ListBars";
/// Path of `StreamAPI.Chat`.
pub const CHAT_PATH: &str = "/example.StreamAPI/Chat";
/// Path of `StreamAPI.Collect`.
pub const COLLECT_PATH: &str = "/example.StreamAPI/Collect";
/// Path of `StreamAPI.Ticks`.
pub const TICKS_PATH: &str = "/example.StreamAPI/Ticks";
/// Responses emitted by `Ticks`.
pub const TICK_COUNT: usize = 3;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mock server startup failures.
#[derive(Debug, Error)]
pub enum MockError {
    /// Binding the loopback listener failed.
    #[error("mock server bind failed: {0}")]
    Bind(#[from] std::io::Error),
    /// Building the reflection service failed.
    #[error("mock reflection setup failed: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Request and response layout shared by every example method.
#[derive(Clone, PartialEq, Message)]
pub struct EchoMessage {
    /// Free-form text.
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Builds the echo reply for `message` received with `metadata`.
#[must_use]
pub fn echo_reply(metadata: &MetadataMap, message: &str) -> EchoMessage {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let headers = metadata.clone().into_headers();
    for (key, value) in &headers {
        if let Ok(value) = value.to_str() {
            entries.entry(key.as_str().to_string()).or_default().push(value.to_string());
        }
    }
    let rendered: Vec<String> =
        entries.iter().map(|(key, values)| format!("{key}:[{}]", values.join(" "))).collect();
    EchoMessage {
        message: format!("Incoming Message: {message} \n Metadata: map[{}]", rendered.join(" ")),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Boxed response stream.
type EchoStream = Pin<Box<dyn Stream<Item = Result<EchoMessage, Status>> + Send>>;

/// Unary echo used by `Hello` and `ListBars`.
#[derive(Debug, Clone, Copy)]
struct Echo;

impl UnaryService<EchoMessage> for Echo {
    type Response = EchoMessage;
    type Future = BoxFuture<Response<EchoMessage>, Status>;

    fn call(&mut self, request: Request<EchoMessage>) -> Self::Future {
        let reply = echo_reply(request.metadata(), &request.get_ref().message);
        Box::pin(async move { Ok(Response::new(reply)) })
    }
}

/// Bidirectional echo.
#[derive(Debug, Clone, Copy)]
struct Chat;

impl StreamingService<EchoMessage> for Chat {
    type Response = EchoMessage;
    type ResponseStream = EchoStream;
    type Future = BoxFuture<Response<EchoStream>, Status>;

    fn call(&mut self, request: Request<Streaming<EchoMessage>>) -> Self::Future {
        let metadata = request.metadata().clone();
        let replies = request
            .into_inner()
            .map(move |item| item.map(|got| echo_reply(&metadata, &got.message)));
        Box::pin(async move { Ok(Response::new(Box::pin(replies) as EchoStream)) })
    }
}

/// How one `Collect` request stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The client half-closed; holds the joined messages.
    Completed(String),
    /// The stream failed before the client half-closed.
    Aborted,
}

/// Outcomes of every `Collect` call served.
#[derive(Debug, Clone, Default)]
pub struct CollectLog {
    /// Outcomes in completion order.
    outcomes: Arc<Mutex<Vec<CollectOutcome>>>,
}

impl CollectLog {
    /// Appends `outcome`.
    fn record(&self, outcome: CollectOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(outcome);
        }
    }

    /// Returns the outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<CollectOutcome> {
        self.outcomes.lock().map(|outcomes| outcomes.clone()).unwrap_or_default()
    }
}

/// Client-streaming join of every request.
#[derive(Debug, Clone)]
struct Collect {
    /// Where each call's outcome goes.
    log: CollectLog,
}

impl ClientStreamingService<EchoMessage> for Collect {
    type Response = EchoMessage;
    type Future = BoxFuture<Response<EchoMessage>, Status>;

    fn call(&mut self, request: Request<Streaming<EchoMessage>>) -> Self::Future {
        let metadata = request.metadata().clone();
        let mut inbound = request.into_inner();
        let log = self.log.clone();
        Box::pin(async move {
            let mut parts = Vec::new();
            loop {
                match inbound.message().await {
                    Ok(Some(got)) => parts.push(got.message),
                    Ok(None) => break,
                    Err(status) => {
                        log.record(CollectOutcome::Aborted);
                        return Err(status);
                    }
                }
            }
            let joined = parts.join(",");
            log.record(CollectOutcome::Completed(joined.clone()));
            Ok(Response::new(echo_reply(&metadata, &joined)))
        })
    }
}

/// Server-streaming counter.
#[derive(Debug, Clone, Copy)]
struct Ticks;

impl ServerStreamingService<EchoMessage> for Ticks {
    type Response = EchoMessage;
    type ResponseStream = EchoStream;
    type Future = BoxFuture<Response<EchoStream>, Status>;

    fn call(&mut self, request: Request<EchoMessage>) -> Self::Future {
        let metadata = request.metadata().clone();
        let message = request.into_inner().message;
        let replies: Vec<Result<EchoMessage, Status>> = (1..=TICK_COUNT)
            .map(|tick| Ok(echo_reply(&metadata, &format!("{message} {tick}"))))
            .collect();
        let replies = Box::pin(tokio_stream::iter(replies)) as EchoStream;
        Box::pin(async move { Ok(Response::new(replies)) })
    }
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Names one mocked service.
pub trait MockApi: Send + Sync + 'static {
    /// Fully-qualified service name.
    const NAME: &'static str;
}

/// `example.FooAPI`.
#[derive(Debug)]
pub struct FooApi;

impl MockApi for FooApi {
    const NAME: &'static str = "example.FooAPI";
}

/// `example.BarAPI`.
#[derive(Debug)]
pub struct BarApi;

impl MockApi for BarApi {
    const NAME: &'static str = "example.BarAPI";
}

/// `example.StreamAPI`.
#[derive(Debug)]
pub struct StreamApi;

impl MockApi for StreamApi {
    const NAME: &'static str = "example.StreamAPI";
}

/// Routes the methods of one [`MockApi`].
#[derive(Debug)]
pub struct MockService<A> {
    /// Service marker.
    api: PhantomData<fn() -> A>,
    /// Shared `Collect` outcomes.
    collects: CollectLog,
}

impl<A> MockService<A> {
    /// Creates the service, recording `Collect` outcomes into `collects`.
    #[must_use]
    pub const fn new(collects: CollectLog) -> Self {
        Self {
            api: PhantomData,
            collects,
        }
    }
}

impl<A> Clone for MockService<A> {
    fn clone(&self) -> Self {
        Self::new(self.collects.clone())
    }
}

impl<A: MockApi> NamedService for MockService<A> {
    const NAME: &'static str = A::NAME;
}

impl<A, B> Service<http::Request<B>> for MockService<A>
where
    A: MockApi,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let collects = self.collects.clone();
        Box::pin(async move { Ok(dispatch(request, collects).await) })
    }
}

/// Runs the handler matching the request path.
async fn dispatch<B>(
    request: http::Request<B>,
    collects: CollectLog,
) -> http::Response<tonic::body::BoxBody>
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    let mut grpc = Grpc::new(ProstCodec::<EchoMessage, EchoMessage>::default());
    let path = request.uri().path().to_string();
    match path.as_str() {
        HELLO_PATH | LIST_BARS_PATH => grpc.unary(Echo, request).await,
        CHAT_PATH => grpc.streaming(Chat, request).await,
        COLLECT_PATH => {
            grpc.client_streaming(
                Collect {
                    log: collects,
                },
                request,
            )
            .await
        }
        TICKS_PATH => grpc.server_streaming(Ticks, request).await,
        _ => unimplemented_response(),
    }
}

/// Builds the `Unimplemented` trailers-only response.
fn unimplemented_response() -> http::Response<tonic::body::BoxBody> {
    let mut response = http::Response::new(empty_body());
    let headers = response.headers_mut();
    headers.insert(Status::GRPC_STATUS, (tonic::Code::Unimplemented as i32).into());
    headers.insert(http::header::CONTENT_TYPE, tonic::metadata::GRPC_CONTENT_TYPE);
    response
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Reflection flavour served by a [`MockServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reflection {
    /// `grpc.reflection.v1`.
    V1,
    /// `grpc.reflection.v1alpha` only.
    V1Alpha,
    /// Both versions, each listing the other among its services.
    Both,
    /// No reflection service.
    Disabled,
}

/// Returns a reflection builder over the example API descriptors.
fn reflection_builder() -> tonic_reflection::server::Builder<'static> {
    tonic_reflection::server::Builder::configure()
        .register_file_descriptor_set(example_descriptor_set())
}

/// Handle for a running mock server.
#[derive(Debug)]
pub struct MockServer {
    /// Bound loopback address.
    addr: SocketAddr,
    /// Signals graceful shutdown.
    shutdown: oneshot::Sender<()>,
    /// Outcomes of `Collect` calls.
    collects: CollectLog,
    /// Serving task.
    join: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl MockServer {
    /// Starts a server on a free loopback port.
    ///
    /// # Errors
    ///
    /// Returns [`MockError`] when the port cannot be bound or reflection
    /// cannot be built.
    pub async fn spawn(reflection: Reflection) -> Result<Self, MockError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let collects = CollectLog::default();
        let mut router = Server::builder()
            .add_service(MockService::<FooApi>::new(collects.clone()))
            .add_service(MockService::<BarApi>::new(collects.clone()))
            .add_service(MockService::<StreamApi>::new(collects.clone()));
        router = match reflection {
            Reflection::V1 => router.add_service(reflection_builder().build_v1()?),
            Reflection::V1Alpha => router.add_service(reflection_builder().build_v1alpha()?),
            Reflection::Both => router
                .add_service(
                    reflection_builder()
                        .register_encoded_file_descriptor_set(
                            tonic_reflection::pb::v1alpha::FILE_DESCRIPTOR_SET,
                        )
                        .build_v1()?,
                )
                .add_service(
                    reflection_builder()
                        .register_encoded_file_descriptor_set(
                            tonic_reflection::pb::v1::FILE_DESCRIPTOR_SET,
                        )
                        .build_v1alpha()?,
                ),
            Reflection::Disabled => router,
        };

        let (shutdown, signal) = oneshot::channel();
        let incoming = TcpListenerStream::new(listener);
        let join = tokio::spawn(router.serve_with_incoming_shutdown(incoming, async {
            let _ = signal.await;
        }));
        Ok(Self {
            addr,
            shutdown,
            collects,
            join,
        })
    }

    /// Returns the `host:port` address to dial.
    #[must_use]
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Returns how each `Collect` call ended so far.
    #[must_use]
    pub fn collects(&self) -> Vec<CollectOutcome> {
        self.collects.outcomes()
    }

    /// Stops the server and waits for the serving task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.join.await;
    }
}
