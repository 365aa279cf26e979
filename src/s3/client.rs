//! S3 client facade: the file-manager operations over one bucket
//!
//! Every operation builds a [`RequestDescriptor`], signs it with the shared
//! [`SignatureV4`] signer and hands it to a [`Transport`]. Responses are
//! mapped back to plain records or an [`S3Error`].
//!
//! - Virtual-hosted endpoints by default, path-style for custom endpoints
//! - Keys URI-encoded once into the path (slashes kept), signed verbatim
//! - Content-MD5 on every PUT
//! - ListObjectsV2 pages followed to the end
//! - Byte-slice tag matching when parsing XML

use bytes::Bytes;
use chrono::Utc;
use hyper::{StatusCode, Uri};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

use crate::files::{increment_name, timestamp_name};
use crate::s3::canonical::uri_escape_path;
use crate::s3::credentials::Credentials;
use crate::s3::presign::presign_s3_url;
use crate::s3::request::RequestDescriptor;
use crate::s3::signer::{PresignOptions, SignatureV4, SignerError, SigningOptions};
use crate::s3::transport::{HttpResponse, Transport};
use crate::s3::types::{ListObjectsPage, StoredObjectSummary, UploadMode, UploadOutcome};

/// Default bound on `name(n).ext` probes during an upload
pub const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 100;

/// Keys per ListObjectsV2 page
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Longest key S3 accepts, in bytes
const MAX_KEY_LEN: usize = 1024;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("Signing error: {0}")]
    Signer(#[from] SignerError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("S3 error: {status} - {message}")]
    S3Response { status: StatusCode, message: String },

    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("No free name for '{file_name}' after {attempts} attempts")]
    NameCollisionExhausted { file_name: String, attempts: u32 },

    #[error("Copied '{from}' to '{to}' but could not delete the original: {source}")]
    PartialRename {
        from: String,
        to: String,
        #[source]
        source: Box<S3Error>,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<quick_xml::Error> for S3Error {
    fn from(err: quick_xml::Error) -> Self {
        S3Error::XmlParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;

/// Where the bucket lives and how keys map onto paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
    /// `host/bucket/key` instead of `bucket.host/key`
    pub path_style: bool,
}

impl Endpoint {
    /// `https://{bucket}.s3.{region}.amazonaws.com`
    pub fn aws(bucket: &str, region: &str) -> Self {
        Self {
            protocol: "https:".to_string(),
            hostname: format!("{}.s3.{}.amazonaws.com", bucket, region),
            port: None,
            path_style: false,
        }
    }

    /// A custom S3-compatible endpoint (MinIO, R2, ...), addressed path-style
    pub fn custom(url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| S3Error::InvalidEndpoint(format!("{}: {}", url, e)))?;
        let scheme = uri.scheme_str().unwrap_or("https");
        if scheme != "http" && scheme != "https" {
            return Err(S3Error::InvalidEndpoint(format!("unsupported scheme in {}", url)));
        }
        let hostname = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| S3Error::InvalidEndpoint(format!("missing host in {}", url)))?;
        Ok(Self {
            protocol: format!("{}:", scheme),
            hostname: hostname.to_string(),
            port: uri.port_u16(),
            path_style: true,
        })
    }
}

/// S3 file-manager client
///
/// Clone is cheap: the transport and the signer (with its key cache) are
/// shared between clones.
#[derive(Clone)]
pub struct S3Client {
    transport: Arc<dyn Transport>,
    signer: Arc<SignatureV4>,
    credentials: Credentials,
    bucket: String,
    endpoint: Endpoint,
    max_name_attempts: u32,
    page_size: u32,
}

impl S3Client {
    pub fn new(
        bucket: impl Into<String>,
        region: &str,
        credentials: Credentials,
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            signer: Arc::new(SignatureV4::for_s3(region)),
            credentials,
            bucket: bucket.into(),
            endpoint,
            max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_max_name_attempts(mut self, attempts: u32) -> Self {
        self.max_name_attempts = attempts.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Encode an S3 key, preserving forward slashes
    /// Returns Cow::Borrowed when no encoding is needed
    fn encode_s3_key(key: &str) -> Cow<'_, str> {
        let needs_encoding = key
            .bytes()
            .any(|b| !matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/'));

        if !needs_encoding {
            return Cow::Borrowed(key);
        }
        Cow::Owned(uri_escape_path(key))
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(S3Error::InvalidKey("key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(S3Error::InvalidKey(format!(
                "key is {} bytes, the limit is {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        Ok(())
    }

    /// Request path for a key, or for the bucket itself when `key` is None
    fn build_path(&self, key: Option<&str>) -> String {
        let encoded = key.map(Self::encode_s3_key).unwrap_or(Cow::Borrowed(""));
        if self.endpoint.path_style {
            if key.is_some() {
                format!("/{}/{}", self.bucket, encoded)
            } else {
                format!("/{}", self.bucket)
            }
        } else {
            format!("/{}", encoded)
        }
    }

    /// Unsigned request skeleton with the host header in place
    fn build_request(&self, method: &str, key: Option<&str>) -> RequestDescriptor {
        let request = RequestDescriptor::new(
            method,
            &self.endpoint.protocol,
            &self.endpoint.hostname,
            &self.build_path(key),
        )
        .with_port(self.endpoint.port);
        let host = request.authority();
        request.with_header("host", &host)
    }

    /// Sign and send
    async fn execute(&self, request: RequestDescriptor) -> Result<HttpResponse> {
        let signed = self
            .signer
            .sign_request(&request, &self.credentials, &SigningOptions::default())?;
        let method = signed.method.clone();
        let path = signed.path.clone();

        let response = self.transport.send(signed).await?;
        tracing::debug!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            "s3_request"
        );
        Ok(response)
    }

    /// Map a non-success response to an error
    fn check_status(response: HttpResponse, key: &str) -> Result<HttpResponse> {
        if response.status == StatusCode::NOT_FOUND {
            return Err(S3Error::NotFound { key: key.to_string() });
        }
        if !response.status.is_success() {
            let message = parse_error_body(&response.body)
                .map(|(code, message)| format!("{}: {}", code, message))
                .unwrap_or_else(|| response.body_text());
            return Err(S3Error::S3Response {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }

    /// List every object under `prefix`, following continuation tokens
    pub async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<StoredObjectSummary>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self.list_objects_page(prefix, token.as_deref()).await?;
            pages += 1;
            objects.extend(page.contents);

            match page.next_continuation_token {
                Some(next) if page.is_truncated => {
                    if token.as_deref() == Some(next.as_str()) {
                        tracing::warn!(bucket = %self.bucket, token = %next, pages, "list_objects_token_repeated");
                        return Err(S3Error::S3Response {
                            status: StatusCode::OK,
                            message: format!("continuation token {:?} returned twice", next),
                        });
                    }
                    token = Some(next);
                }
                _ => break,
            }
        }

        tracing::debug!(bucket = %self.bucket, objects = objects.len(), pages, "list_objects");
        Ok(objects)
    }

    /// One ListObjectsV2 page
    pub async fn list_objects_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage> {
        let mut request = self
            .build_request("GET", None)
            .with_query("list-type", "2")
            .with_query("max-keys", self.page_size.to_string());
        if let Some(p) = prefix.filter(|p| !p.is_empty()) {
            request = request.with_query("prefix", p);
        }
        if let Some(t) = continuation_token {
            request = request.with_query("continuation-token", t);
        }

        let response = Self::check_status(self.execute(request).await?, &self.bucket)?;
        parse_list_response(&response.body)
    }

    /// HEAD the key; a 404 means it does not exist
    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        Self::validate_key(key)?;
        let response = self.execute(self.build_request("HEAD", Some(key))).await?;
        match Self::check_status(response, key) {
            Ok(_) => Ok(true),
            Err(S3Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Put object with a Content-MD5 integrity check
    pub async fn put_object(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        Self::validate_key(key)?;

        let md5_hash = md5::compute(&data);
        let md5_base64 =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &md5_hash[..]);

        let request = self
            .build_request("PUT", Some(key))
            .with_header("content-type", content_type.unwrap_or("application/octet-stream"))
            .with_header("content-length", &data.len().to_string())
            .with_header("content-md5", &md5_base64)
            .with_body(data);

        Self::check_status(self.execute(request).await?, key)?;
        Ok(())
    }

    /// Upload under `file_name`, resolving name collisions according to `mode`
    pub async fn upload(
        &self,
        file_name: &str,
        data: Bytes,
        content_type: Option<&str>,
        mode: UploadMode,
    ) -> Result<UploadOutcome> {
        Self::validate_key(file_name)?;

        let final_name = match mode {
            UploadMode::Replace => file_name.to_string(),
            UploadMode::Timestamp => timestamp_name(file_name, Utc::now().timestamp_millis()),
            UploadMode::Increment => self.free_name(file_name).await?,
        };

        self.put_object(&final_name, data, content_type).await?;
        tracing::info!(file_name = %file_name, stored_as = %final_name, mode = %mode, "upload");

        Ok(UploadOutcome {
            success: true,
            file_name: final_name,
        })
    }

    /// First of `name`, `name(1)`, `name(2)`, ... that does not exist yet
    async fn free_name(&self, file_name: &str) -> Result<String> {
        if !self.object_exists(file_name).await? {
            return Ok(file_name.to_string());
        }
        for counter in 1..=self.max_name_attempts {
            let candidate = increment_name(file_name, counter);
            if !self.object_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        tracing::warn!(file_name = %file_name, attempts = self.max_name_attempts, "name_collision_exhausted");
        Err(S3Error::NameCollisionExhausted {
            file_name: file_name.to_string(),
            attempts: self.max_name_attempts,
        })
    }

    /// Delete object from S3
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;
        Self::check_status(self.execute(self.build_request("DELETE", Some(key))).await?, key)?;
        tracing::info!(key = %key, "delete_object");
        Ok(())
    }

    /// Server-side copy within the bucket
    ///
    /// S3 can report a failed copy with a 200 status and an `<Error>` body.
    pub async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        Self::validate_key(from)?;
        Self::validate_key(to)?;

        let source = format!("{}/{}", self.bucket, Self::encode_s3_key(from));
        let request = self
            .build_request("PUT", Some(to))
            .with_header("x-amz-copy-source", &source);

        let response = Self::check_status(self.execute(request).await?, from)?;
        if let Some((code, message)) = parse_error_body(&response.body) {
            return Err(S3Error::S3Response {
                status: response.status,
                message: format!("{}: {}", code, message),
            });
        }
        Ok(())
    }

    /// Copy then delete. Renaming a key to itself does nothing.
    ///
    /// When the copy succeeds but the delete fails, both objects exist and
    /// the error is [`S3Error::PartialRename`].
    pub async fn rename_object(&self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        self.copy_object(from, to).await?;

        if let Err(e) = self.delete_object(from).await {
            tracing::error!(from = %from, to = %to, error = %e, "rename_delete_failed");
            return Err(S3Error::PartialRename {
                from: from.to_string(),
                to: to.to_string(),
                source: Box::new(e),
            });
        }
        tracing::info!(from = %from, to = %to, "rename_object");
        Ok(())
    }

    /// Time-limited download link
    pub fn presigned_get_url(&self, key: &str, expires_in: u64) -> Result<String> {
        Self::validate_key(key)?;
        self.presigned_url(self.build_request("GET", Some(key)), expires_in)
    }

    /// Time-limited upload link; the uploader must send `content_type` if given
    pub fn presigned_put_url(&self, key: &str, expires_in: u64, content_type: Option<&str>) -> Result<String> {
        Self::validate_key(key)?;
        let mut request = self.build_request("PUT", Some(key));
        if let Some(ct) = content_type {
            request = request.with_header("content-type", ct);
        }
        self.presigned_url(request, expires_in)
    }

    fn presigned_url(&self, request: RequestDescriptor, expires_in: u64) -> Result<String> {
        let options = PresignOptions {
            expires_in,
            ..Default::default()
        };
        Ok(presign_s3_url(&self.signer, &request, &self.credentials, &options)?)
    }
}

/// Parse ListObjectsV2 XML response
///
/// Byte-slice tag matching and `std::mem::take` keep allocations to one
/// String per field. Text is not trimmed: keys and continuation tokens may
/// begin or end with whitespace.
pub fn parse_list_response(xml_data: &[u8]) -> Result<ListObjectsPage> {
    let mut reader = Reader::from_reader(xml_data);

    let mut response = ListObjectsPage::new();
    let mut current_object: Option<StoredObjectSummary> = None;
    let mut current_text = String::with_capacity(256);
    let mut in_common_prefixes = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                // Only the text inside the element counts, not the
                // indentation before it
                current_text.clear();
                match e.local_name().as_ref() {
                    b"Contents" => {
                        current_object = Some(StoredObjectSummary::new(String::new(), 0));
                    }
                    b"CommonPrefixes" => {
                        in_common_prefixes = true;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                current_text.push_str(&e.unescape()?);
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Key" => {
                        if let Some(ref mut obj) = current_object {
                            obj.key = std::mem::take(&mut current_text);
                        }
                    }
                    b"Size" => {
                        if let Some(ref mut obj) = current_object {
                            obj.size = current_text.trim().parse().map_err(|_| {
                                S3Error::XmlParse(format!("invalid object size: {:?}", current_text))
                            })?;
                        }
                    }
                    b"LastModified" => {
                        if let Some(ref mut obj) = current_object {
                            obj.last_modified = Some(std::mem::take(&mut current_text));
                        }
                    }
                    b"Contents" => {
                        if let Some(obj) = current_object.take() {
                            response.contents.push(obj);
                        }
                    }
                    b"CommonPrefixes" => {
                        in_common_prefixes = false;
                    }
                    b"Prefix" if !in_common_prefixes => {
                        response.prefix = Some(std::mem::take(&mut current_text));
                    }
                    b"IsTruncated" => {
                        response.is_truncated = current_text.trim() == "true";
                    }
                    b"NextContinuationToken" => {
                        response.next_continuation_token = Some(std::mem::take(&mut current_text));
                    }
                    b"KeyCount" => {
                        response.key_count = current_text.trim().parse().ok();
                    }
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(S3Error::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(response)
}

/// `(Code, Message)` of an S3 `<Error>` document, `None` for anything else
pub fn parse_error_body(xml_data: &[u8]) -> Option<(String, String)> {
    let mut reader = Reader::from_reader(xml_data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut depth = 0usize;
    let mut is_error = false;
    let mut code = String::new();
    let mut message = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    is_error = e.local_name().as_ref() == b"Error";
                }
                depth += 1;
            }
            Ok(Event::Text(e)) => {
                current_text = e.unescape().map(|t| t.into_owned()).unwrap_or_default();
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if is_error && depth == 1 {
                    match e.local_name().as_ref() {
                        b"Code" => code = std::mem::take(&mut current_text),
                        b"Message" => message = std::mem::take(&mut current_text),
                        _ => {}
                    }
                }
                current_text.clear();
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    is_error.then_some((code, message))
}
