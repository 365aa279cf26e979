use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::core::Core;
use crate::s3::{S3Error, SignerError};
use crate::server::routes::ApiRoute;

/// HTTP body type for responses
type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Status and JSON payload of an API response, before it becomes HTTP
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    old_key: String,
    new_key: String,
}

/// HTTP status for a failed operation
///
/// Clients only ever see a generic message; the error itself is logged.
fn status_for(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<S3Error>() {
        Some(S3Error::NotFound { .. }) => StatusCode::NOT_FOUND,
        Some(S3Error::InvalidKey(_)) => StatusCode::BAD_REQUEST,
        Some(S3Error::Signer(SignerError::ExpiryTooLarge { .. })) => StatusCode::BAD_REQUEST,
        Some(S3Error::NameCollisionExhausted { .. }) => StatusCode::CONFLICT,
        Some(S3Error::S3Response { .. }) | Some(S3Error::Transport(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Collect a request body, refusing anything over `limit` bytes
async fn read_body<B>(body: B, limit: usize) -> std::result::Result<Bytes, ApiResponse>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit, "Request body too large");
            Err(ApiResponse::error(StatusCode::PAYLOAD_TOO_LARGE, "File too large"))
        }
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            Err(ApiResponse::error(StatusCode::BAD_REQUEST, "Failed to read request body"))
        }
    }
}

/// File manager API server state
pub struct ApiServer {
    core: Core,
    listen: String,
}

impl ApiServer {
    /// Create a new API server with the given core and listen address
    pub fn new(core: Core, listen: String) -> Self {
        Self { core, listen }
    }

    /// Start the server and listen for incoming connections
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .listen
            .parse()
            .context(format!("Invalid listen address: {}", self.listen))?;

        let listener = TcpListener::bind(addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        info!(
            bucket = %self.core.config.storage.bucket,
            region = %self.core.config.storage.region,
            "s3filer API listening on {}",
            addr
        );

        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle_request(req).await }
                });

                if let Err(e) = http1::Builder::new()
                    .keep_alive(true)
                    .serve_connection(io, service)
                    .await
                {
                    // Filter out benign connection reset errors
                    let err_str = format!("{}", e);
                    if !err_str.contains("connection reset") && !err_str.contains("broken pipe") {
                        error!("Error serving connection from {}: {}", remote_addr, e);
                    }
                }
            });
        }
    }

    /// Route an incoming HTTP request and render the result
    async fn handle_request(&self, req: Request<Incoming>) -> Result<Response<BoxBody>> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        debug!("{} {}", method, uri);

        let route = ApiRoute::from_parts(&method, uri.path(), uri.query());
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if route == ApiRoute::Health {
            return Ok(Self::text_response(StatusCode::OK, "ok"));
        }

        let body = match read_body(req.into_body(), self.core.config.server.max_body_size).await {
            Ok(body) => body,
            Err(response) => return Ok(Self::json_response(response)),
        };

        let response = self.handle(route, body, content_type.as_deref()).await;
        Ok(Self::json_response(response))
    }

    /// Run one API operation against the core
    pub async fn handle(&self, route: ApiRoute, body: Bytes, content_type: Option<&str>) -> ApiResponse {
        let name = route.name();
        let (result, failure) = match route {
            ApiRoute::Health => (Ok(json!("ok")), ""),
            ApiRoute::ListFiles { folder: None } => (
                self.core
                    .list_files()
                    .await
                    .and_then(|files| Ok(serde_json::to_value(files)?)),
                "Failed to list files",
            ),
            ApiRoute::ListFiles { folder: Some(folder) } => (
                self.core
                    .folder_view(Some(&folder))
                    .await
                    .and_then(|view| Ok(serde_json::to_value(view)?)),
                "Failed to list files",
            ),
            ApiRoute::FileExists { name } => (
                self.core
                    .file_exists(&name)
                    .await
                    .map(|exists| json!({ "exists": exists })),
                "Failed to check file",
            ),
            ApiRoute::Upload { name, mode } => (
                self.core
                    .upload(&name, body, content_type, mode)
                    .await
                    .and_then(|outcome| Ok(serde_json::to_value(outcome)?)),
                "Failed to upload file",
            ),
            ApiRoute::Delete { key } => (
                self.core.delete(&key).await.map(|_| json!({ "success": true })),
                "Failed to delete file",
            ),
            ApiRoute::Rename => (self.rename(&body).await, "Failed to rename file"),
            ApiRoute::DownloadUrl { key, expires_in } => (
                self.core
                    .download_url(&key, expires_in)
                    .map(|url| json!({ "url": url })),
                "Failed to create download link",
            ),
            ApiRoute::BadRequest(reason) => {
                debug!(route = name, reason = %reason, "api_bad_request");
                return ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request");
            }
            ApiRoute::Unknown { method, path } => {
                debug!(method = %method, path = %path, "api_unknown_route");
                return ApiResponse::error(StatusCode::NOT_FOUND, "Not found");
            }
        };

        match result {
            Ok(value) => ApiResponse::ok(value),
            Err(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!(route = name, error = %format!("{:#}", e), "api_error");
                } else {
                    warn!(route = name, error = %format!("{:#}", e), "api_error");
                }
                ApiResponse::error(status, failure)
            }
        }
    }

    async fn rename(&self, body: &Bytes) -> Result<Value> {
        let request: RenameRequest = serde_json::from_slice(body)
            .map_err(|e| S3Error::InvalidKey(format!("invalid rename body: {}", e)))?;
        self.core.rename(&request.old_key, &request.new_key).await?;
        Ok(json!({ "success": true }))
    }

    fn json_response(response: ApiResponse) -> Response<BoxBody> {
        let body = response.body.to_string();
        Self::build_response(response.status, "application/json", body)
    }

    fn text_response(status: StatusCode, text: &str) -> Response<BoxBody> {
        Self::build_response(status, "text/plain", text.to_string())
    }

    fn build_response(status: StatusCode, content_type: &str, body: String) -> Response<BoxBody> {
        let mut response = Response::new(Self::string_body(body));
        *response.status_mut() = status;
        if let Ok(value) = content_type.parse() {
            response.headers_mut().insert("content-type", value);
        }
        response
    }

    /// Convert a string into a BoxBody
    fn string_body(s: String) -> BoxBody {
        use http_body_util::Full;
        Full::new(Bytes::from(s))
            .map_err(|never| match never {})
            .boxed()
    }
}
