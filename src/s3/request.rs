//! Protocol-neutral description of an outbound HTTP request
//!
//! The signer works on this shape rather than on a hyper `Request` so that
//! signing stays a pure transformation: it clones the descriptor, adds auth
//! material, and hands back a new value. The transport turns the result into
//! a real request.

use bytes::Bytes;
use std::collections::BTreeMap;

use crate::s3::canonical::uri_escape;

/// Request body as seen by the signer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    /// No body (GET, HEAD, DELETE, copy)
    #[default]
    Empty,
    /// Fully buffered body, hashed with SHA-256 when signed
    Bytes(Bytes),
    /// Body whose bytes are not available up front, signed as UNSIGNED-PAYLOAD
    Streaming,
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(b) => b.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffered bytes to put on the wire (empty for `Empty` and `Streaming`)
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Payload::Bytes(b) => b.clone(),
            _ => Bytes::new(),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(value))
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// A query parameter value: `?a=1` or `?a=1&a=2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

/// Everything needed to sign and send one HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    /// `https:` or `http:` (a trailing colon is optional)
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
    /// Already URI-encoded path, e.g. `/my%20file.txt`
    pub path: String,
    /// Raw (unencoded) query parameters
    pub query: BTreeMap<String, QueryValue>,
    /// Header names keep the caller's casing; lookups are case-insensitive
    pub headers: BTreeMap<String, String>,
    pub body: Payload,
    pub username: Option<String>,
    pub password: Option<String>,
    pub fragment: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: &str, protocol: &str, hostname: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            protocol: protocol.to_string(),
            hostname: hostname.to_string(),
            port: None,
            path: path.to_string(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: Payload::Empty,
            username: None,
            password: None,
            fragment: None,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: impl Into<QueryValue>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = body.into();
        self
    }

    /// `host[:port]`, the value the `host` header must carry
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.hostname, port),
            None => self.hostname.clone(),
        }
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every header matching `name`, whatever its casing
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    }

    pub fn query_value(&self, name: &str) -> Option<&QueryValue> {
        self.query.get(name)
    }

    /// Render as a URL: `protocol//[user:pass@]host[:port]/path[?query][#fragment]`
    pub fn format_url(&self) -> String {
        let mut protocol = self.protocol.clone();
        if !protocol.is_empty() && !protocol.ends_with(':') {
            protocol.push(':');
        }

        let mut path = self.path.clone();
        if !path.is_empty() && !path.starts_with('/') {
            path.insert(0, '/');
        }

        let auth = if self.username.is_some() || self.password.is_some() {
            format!(
                "{}:{}@",
                self.username.as_deref().unwrap_or(""),
                self.password.as_deref().unwrap_or("")
            )
        } else {
            String::new()
        };

        let query = build_query_string(&self.query);
        let mut url = format!("{}//{}{}{}", protocol, auth, self.authority(), path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        if let Some(fragment) = self.fragment.as_deref().filter(|f| !f.is_empty()) {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

/// Serialize query parameters for a URL, keys in raw sort order
fn build_query_string(query: &BTreeMap<String, QueryValue>) -> String {
    let mut parts = Vec::with_capacity(query.len());
    for (key, value) in query {
        let key = uri_escape(key);
        for v in value.values() {
            parts.push(format!("{}={}", key, uri_escape(v)));
        }
    }
    parts.join("&")
}
