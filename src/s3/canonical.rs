//! Canonical request pieces for SigV4
//!
//! Every function here must be bit-exact with what the storage service
//! recomputes on its side, otherwise the signature is rejected.

use std::collections::{BTreeMap, HashSet};

use crate::s3::constants::{ALWAYS_UNSIGNABLE_HEADERS, SIGNATURE_QUERY_PARAM, UNSIGNABLE_PREFIXES};
use crate::s3::request::RequestDescriptor;

/// Hex lookup table for zero-allocation percent encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Percent-encode everything outside `A-Z a-z 0-9 - _ . ~`
///
/// This is stricter than form encoding: `!'()*` and `/` are escaped too.
pub fn uri_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 16);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    result
}

/// Same as [`uri_escape`] but leaves `/` alone (object keys in paths)
pub fn uri_escape_path(s: &str) -> String {
    uri_escape(s).replace("%2F", "/")
}

/// Canonical URI of a request path
///
/// With `escape` set, dot segments are resolved and the (already encoded)
/// path is encoded once more. S3 signs the path verbatim instead.
pub fn canonical_path(path: &str, escape: bool) -> String {
    if !escape {
        return path.to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut normalized = String::with_capacity(path.len());
    if path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(&segments.join("/"));
    if !segments.is_empty() && path.ends_with('/') {
        normalized.push('/');
    }

    uri_escape_path(&normalized)
}

/// Canonical query string: encoded, sorted, `X-Amz-Signature` excluded
pub fn canonical_query(request: &RequestDescriptor) -> String {
    let mut serialized: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in &request.query {
        if key.eq_ignore_ascii_case(SIGNATURE_QUERY_PARAM) {
            continue;
        }
        let encoded_key = uri_escape(key);
        let mut pairs: Vec<String> = value
            .values()
            .into_iter()
            .map(|v| format!("{}={}", encoded_key, uri_escape(v)))
            .collect();
        pairs.sort();
        if pairs.is_empty() {
            continue;
        }
        serialized.insert(encoded_key, pairs.join("&"));
    }

    serialized.into_values().collect::<Vec<_>>().join("&")
}

/// Whether a lower-cased header name is excluded from signatures by default
pub fn is_unsignable(name: &str, unsignable: Option<&HashSet<String>>) -> bool {
    ALWAYS_UNSIGNABLE_HEADERS.contains(&name)
        || unsignable.map(|set| set.contains(name)).unwrap_or(false)
        || UNSIGNABLE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Canonical headers: lower-case names, collapsed values, sorted by name
///
/// Headers matched by [`is_unsignable`] are dropped unless they appear in
/// `signable`.
pub fn canonical_headers(
    request: &RequestDescriptor,
    unsignable: Option<&HashSet<String>>,
    signable: Option<&HashSet<String>>,
) -> BTreeMap<String, String> {
    let mut canonical = BTreeMap::new();
    for (name, value) in &request.headers {
        let name = name.to_ascii_lowercase();
        if is_unsignable(&name, unsignable)
            && !signable.map(|set| set.contains(&name)).unwrap_or(false)
        {
            continue;
        }
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        canonical.insert(name, value);
    }
    canonical
}

/// `a;b;c` list of signed header names
pub fn signed_header_list(headers: &BTreeMap<String, String>) -> String {
    headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

/// The full canonical request string that gets hashed into the string to sign
pub fn canonical_request(
    request: &RequestDescriptor,
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
    escape_path: bool,
) -> String {
    let mut header_block = String::with_capacity(headers.len() * 64);
    for (k, v) in headers {
        header_block.push_str(k);
        header_block.push(':');
        header_block.push_str(v);
        header_block.push('\n');
    }

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        canonical_path(&request.path, escape_path),
        canonical_query(request),
        header_block,
        signed_header_list(headers),
        payload_hash
    )
}
