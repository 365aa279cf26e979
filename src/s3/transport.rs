//! HTTP transport for signed requests
//!
//! The client facade only builds and signs [`RequestDescriptor`]s; a
//! [`Transport`] puts them on the wire. [`HyperTransport`] talks to a real
//! endpoint, [`MemoryTransport`] is an in-process bucket used by tests.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::s3::client::{Result, S3Error};
use crate::s3::request::{QueryValue, RequestDescriptor};

/// Status, lower-cased headers and fully buffered body of a response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK, Bytes::new())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Sends one signed request and returns the buffered response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse>;
}

/// HTTPS transport over the hyper legacy client
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    /// Build the client: HTTP/1.1, pooled connections, TCP_NODELAY
    pub fn new(insecure_tls: bool) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
        } else {
            TlsConnector::new()
        }
        .map_err(|e| S3Error::Transport(format!("Failed to build TLS connector: {}", e)))?;

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32)
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            timeout: Duration::from_secs(300),
        })
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| S3Error::Transport(format!("Invalid method: {}", e)))?;

        // Credentials and fragments never go on the wire
        let mut wire = request;
        wire.username = None;
        wire.password = None;
        wire.fragment = None;
        let url = wire.format_url();

        let mut req = Request::builder().method(method).uri(&url);
        for (key, value) in wire.headers.iter() {
            req = req.header(key.as_str(), value.as_str());
        }
        if !wire.has_header("content-length") && !wire.body.is_empty() {
            req = req.header("content-length", wire.body.len().to_string());
        }

        let request = req
            .body(Full::new(wire.body.to_bytes()))
            .map_err(|e| S3Error::Transport(format!("Request build error: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| S3Error::Transport(format!("Request timed out: {}", url)))?
            .map_err(|e| S3Error::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .collect()
            .await
            .map_err(|e| S3Error::Transport(format!("Body error: {}", e)))?
            .to_bytes();

        Ok(HttpResponse { status, headers, body })
    }
}

/// A stored object in [`MemoryTransport`]
#[derive(Debug, Clone)]
struct MemoryObject {
    body: Bytes,
    last_modified: String,
}

/// Canned response for requests matching a method and key
#[derive(Debug, Clone)]
struct InjectedFailure {
    method: String,
    key: String,
    status: StatusCode,
    body: Bytes,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, MemoryObject>,
    requests: Vec<RequestDescriptor>,
    failures: Vec<InjectedFailure>,
}

/// In-process bucket that answers the subset of the S3 API the client uses
///
/// Understands both virtual-hosted (`bucket.host/key`) and path-style
/// (`host/bucket/key`) requests, ListObjectsV2 paging, HEAD, PUT, copy and
/// DELETE. Every request is recorded for later inspection.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    bucket: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Seed an object
    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.lock().objects.insert(
            key.to_string(),
            MemoryObject {
                body: body.into(),
                last_modified: "2026-01-15T10:30:00.000Z".to_string(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).map(|o| o.body.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.lock().requests.clone()
    }

    /// Answer `method` requests on `key` with `status` and `body` instead of
    /// touching the bucket
    pub fn fail(&self, method: &str, key: &str, status: StatusCode, body: &str) {
        self.lock().failures.push(InjectedFailure {
            method: method.to_string(),
            key: key.to_string(),
            status,
            body: Bytes::copy_from_slice(body.as_bytes()),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Object key addressed by a request path, `None` for bucket-level requests
    fn object_key(&self, request: &RequestDescriptor) -> Result<Option<String>> {
        let path = request.path.trim_start_matches('/');
        let virtual_host = request.hostname.starts_with(&format!("{}.", self.bucket));
        let raw = if virtual_host {
            path
        } else {
            let rest = path.strip_prefix(self.bucket.as_str()).ok_or_else(|| {
                S3Error::Transport(format!("Request for unknown bucket: {}", request.path))
            })?;
            rest.trim_start_matches('/')
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let key = urlencoding::decode(raw)
            .map_err(|e| S3Error::InvalidKey(format!("{}: {}", raw, e)))?;
        Ok(Some(key.into_owned()))
    }

    fn list(&self, state: &MemoryState, request: &RequestDescriptor) -> HttpResponse {
        let single = |name: &str| match request.query_value(name) {
            Some(QueryValue::Single(v)) => Some(v.clone()),
            _ => None,
        };
        let prefix = single("prefix").unwrap_or_default();
        let max_keys: usize = single("max-keys").and_then(|v| v.parse().ok()).unwrap_or(1000);
        let after = single("continuation-token");

        let matching: Vec<(&String, &MemoryObject)> = state
            .objects
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| after.as_ref().map(|a| k.as_str() > a.as_str()).unwrap_or(true))
            .collect();
        let truncated = matching.len() > max_keys;
        let page = &matching[..matching.len().min(max_keys)];

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
        );
        xml.push_str(&format!("<Name>{}</Name><Prefix>{}</Prefix>", self.bucket, xml_escape(&prefix)));
        xml.push_str(&format!("<KeyCount>{}</KeyCount><MaxKeys>{}</MaxKeys>", page.len(), max_keys));
        xml.push_str(&format!("<IsTruncated>{}</IsTruncated>", truncated));
        for (key, object) in page {
            xml.push_str(&format!(
                "<Contents><Key>{}</Key><LastModified>{}</LastModified><ETag>&quot;{:x}&quot;</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                xml_escape(key),
                object.last_modified,
                md5::compute(&object.body),
                object.body.len()
            ));
        }
        if truncated {
            if let Some((last, _)) = page.last() {
                xml.push_str(&format!(
                    "<NextContinuationToken>{}</NextContinuationToken>",
                    xml_escape(last)
                ));
            }
        }
        xml.push_str("</ListBucketResult>");
        HttpResponse::new(StatusCode::OK, xml)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        let key = self.object_key(&request)?;
        let mut state = self.lock();
        state.requests.push(request.clone());

        let failure = state
            .failures
            .iter()
            .find(|f| f.method == request.method && Some(&f.key) == key.as_ref())
            .cloned();
        if let Some(failure) = failure {
            return Ok(HttpResponse::new(failure.status, failure.body));
        }

        let not_found = || {
            HttpResponse::new(
                StatusCode::NOT_FOUND,
                "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
            )
        };

        let response = match (request.method.as_str(), key) {
            ("GET", None) => self.list(&state, &request),
            ("HEAD", Some(key)) => match state.objects.get(&key) {
                Some(object) => {
                    let mut response = HttpResponse::ok();
                    response
                        .headers
                        .insert("content-length".to_string(), object.body.len().to_string());
                    response
                }
                None => HttpResponse::new(StatusCode::NOT_FOUND, Bytes::new()),
            },
            ("GET", Some(key)) => match state.objects.get(&key) {
                Some(object) => HttpResponse::new(StatusCode::OK, object.body.clone()),
                None => not_found(),
            },
            ("PUT", Some(key)) => match request.header("x-amz-copy-source") {
                Some(source) => {
                    let source = urlencoding::decode(source)
                        .map_err(|e| S3Error::InvalidKey(e.to_string()))?
                        .into_owned();
                    let source_key = source
                        .trim_start_matches('/')
                        .strip_prefix(&format!("{}/", self.bucket))
                        .map(str::to_string);
                    match source_key.and_then(|k| state.objects.get(&k).cloned()) {
                        Some(object) => {
                            state.objects.insert(key, object);
                            HttpResponse::new(
                                StatusCode::OK,
                                "<CopyObjectResult><LastModified>2026-01-15T10:30:00.000Z</LastModified></CopyObjectResult>",
                            )
                        }
                        None => not_found(),
                    }
                }
                None => {
                    state.objects.insert(
                        key,
                        MemoryObject {
                            body: request.body.to_bytes(),
                            last_modified: "2026-01-15T10:30:00.000Z".to_string(),
                        },
                    );
                    HttpResponse::ok()
                }
            },
            ("DELETE", Some(key)) => {
                state.objects.remove(&key);
                HttpResponse::new(StatusCode::NO_CONTENT, Bytes::new())
            }
            (method, _) => HttpResponse::new(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("<Error><Code>MethodNotAllowed</Code><Message>{}</Message></Error>", method),
            ),
        };
        Ok(response)
    }
}

/// Escape the five XML special characters
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
