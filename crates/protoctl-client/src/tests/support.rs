// crates/protoctl-client/src/tests/support.rs
// ============================================================================
// Module: Client Test Support Helpers
// Description: HTTP test server and wire fixtures for transport tests.
// Purpose: Exercise Connect and gRPC-Web calls without a real RPC server.
// Dependencies: hyper, hyper-util (auto), http-body-util, tokio, prost-reflect
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Request;
use hyper::Response;
use hyper::StatusCode;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use prost::Message;
use prost_reflect::DynamicMessage;
use prost_reflect::Value;
use protoctl_schema::OperationDefinition;
use protoctl_schema::SchemaModel;
use protoctl_schema::testing::example_model;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::envelope::FLAG_END_STREAM;
use crate::envelope::FLAG_TRAILER;
use crate::envelope::encode_frame;

// ============================================================================
// SECTION: Wire Fixtures
// ============================================================================

/// Looks up an operation of the example API.
pub fn example_operation(model: &SchemaModel, service: &str, method: &str) -> OperationDefinition {
    model.operation(service, method).expect("example operation").clone()
}

/// Returns the example model and one of its operations.
pub fn example(service: &str, method: &str) -> (SchemaModel, OperationDefinition) {
    let model = example_model();
    let operation = example_operation(&model, service, method);
    (model, operation)
}

/// Encodes an `ExampleResponse`-shaped message carrying `text`.
pub fn response_bytes(operation: &OperationDefinition, text: &str) -> Vec<u8> {
    let mut message = DynamicMessage::new(operation.output().descriptor().clone());
    message.set_field_by_name("message", Value::String(text.to_string()));
    message.encode_to_vec()
}

/// Decodes the `message` field of an enveloped or bare request body.
pub fn request_text(operation: &OperationDefinition, body: &[u8]) -> String {
    let message = DynamicMessage::decode(operation.input().descriptor().clone(), body)
        .expect("decode request");
    message
        .get_field_by_name("message")
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_default()
}

/// Builds a gRPC-Web body of message frames followed by a trailer frame.
pub fn grpc_web_body(messages: &[Vec<u8>], trailers: &str) -> Bytes {
    let mut body = Vec::new();
    for message in messages {
        body.extend_from_slice(&encode_frame(0, message).expect("frame"));
    }
    body.extend_from_slice(&encode_frame(FLAG_TRAILER, trailers.as_bytes()).expect("frame"));
    Bytes::from(body)
}

/// Builds a Connect streaming body ending with `end_stream` JSON.
pub fn connect_stream_body(messages: &[Vec<u8>], end_stream: &str) -> Bytes {
    let mut body = Vec::new();
    for message in messages {
        body.extend_from_slice(&encode_frame(0, message).expect("frame"));
    }
    body.extend_from_slice(&encode_frame(FLAG_END_STREAM, end_stream.as_bytes()).expect("frame"));
    Bytes::from(body)
}

// ============================================================================
// SECTION: HTTP Server
// ============================================================================

/// Captured HTTP request data for assertions.
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body bytes.
    pub body: Bytes,
}

/// Test response wrapper.
#[derive(Clone, Debug)]
pub struct TestResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: Bytes,
}

impl TestResponse {
    /// Builds a 200 response with a content type.
    pub fn ok(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status: StatusCode::OK,
            headers,
            body: body.into(),
        }
    }

    /// Builds a raw response with custom status and headers.
    pub fn raw(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

impl From<TestResponse> for Response<Full<Bytes>> {
    fn from(value: TestResponse) -> Self {
        let mut response = Response::new(Full::new(value.body));
        *response.status_mut() = value.status;
        *response.headers_mut() = value.headers;
        response
    }
}

/// Shared response callback.
type Responder = Arc<Mutex<Box<dyn FnMut(&CapturedRequest) -> TestResponse + Send>>>;

/// Lightweight HTTP/1.1 and cleartext HTTP/2 test server with request capture.
pub struct TestHttpServer {
    /// Bound address.
    addr: SocketAddr,
    /// Requests seen so far.
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    /// Stops the accept loop.
    shutdown: Option<oneshot::Sender<()>>,
    /// Accept loop task.
    handle: JoinHandle<()>,
}

impl TestHttpServer {
    /// Starts the server with a responder callback.
    pub async fn start<F>(responder: F) -> Self
    where
        F: FnMut(&CapturedRequest) -> TestResponse + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(Mutex::new(Box::new(responder)));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let requests_task = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept = listener.accept() => {
                        let Ok((stream, _)) = accept else { continue };
                        let requests = Arc::clone(&requests_task);
                        let responder = Arc::clone(&responder);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req: Request<Incoming>| {
                                let requests = Arc::clone(&requests);
                                let responder = Arc::clone(&responder);
                                async move {
                                    let (parts, body) = req.into_parts();
                                    let bytes = body.collect().await?.to_bytes();
                                    let captured = CapturedRequest {
                                        path: parts.uri.path().to_string(),
                                        headers: parts.headers,
                                        body: bytes,
                                    };
                                    let response = responder.lock().await.as_mut()(&captured);
                                    requests.lock().await.push(captured);
                                    let response: Response<Full<Bytes>> = response.into();
                                    Ok::<_, hyper::Error>(response)
                                }
                            });
                            let _ = auto::Builder::new(TokioExecutor::new())
                                .serve_connection(io, service)
                                .await;
                        });
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    /// Returns the `host:port` address of the server.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Returns a snapshot of captured requests.
    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }

    /// Stops the accept loop.
    pub async fn shutdown(mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
        let _ = self.handle.await;
    }
}
