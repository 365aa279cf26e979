//! Event-stream message shapes and their binary header encoding
//!
//! Each header is encoded as: name length (u8), name bytes, type tag (u8),
//! then the value. Integers are big-endian.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::s3::signer::SignerError;

/// Value of a single event-stream header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Binary(Bytes),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Lower-case hyphenated form, e.g. `b4a8b8bc-...`
    Uuid(String),
}

impl HeaderValue {
    fn type_tag(&self) -> u8 {
        match self {
            HeaderValue::Boolean(true) => 0,
            HeaderValue::Boolean(false) => 1,
            HeaderValue::Byte(_) => 2,
            HeaderValue::Short(_) => 3,
            HeaderValue::Integer(_) => 4,
            HeaderValue::Long(_) => 5,
            HeaderValue::Binary(_) => 6,
            HeaderValue::String(_) => 7,
            HeaderValue::Timestamp(_) => 8,
            HeaderValue::Uuid(_) => 9,
        }
    }
}

/// An event-stream message: ordered headers plus a body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub headers: Vec<(String, HeaderValue)>,
    pub body: Bytes,
}

/// A message to sign, chained to the signature of the previous one
#[derive(Debug, Clone)]
pub struct SignableMessage {
    pub message: Message,
    pub prior_signature: String,
}

#[derive(Debug, Clone)]
pub struct SignedMessage {
    pub message: Message,
    pub signature: String,
}

/// An event whose headers are already encoded
#[derive(Debug, Clone)]
pub struct SignableEvent {
    pub headers: Bytes,
    pub payload: Bytes,
    pub prior_signature: String,
}

/// Encode message headers into their wire form
pub fn format_headers(headers: &[(String, HeaderValue)]) -> Result<Vec<u8>, SignerError> {
    let mut out = Vec::with_capacity(headers.len() * 32);
    for (name, value) in headers {
        let name_len = u8::try_from(name.len()).map_err(|_| {
            SignerError::InvalidEventHeader(format!("header name too long: {}", name.len()))
        })?;
        out.push(name_len);
        out.extend_from_slice(name.as_bytes());
        format_header_value(value, &mut out)?;
    }
    Ok(out)
}

fn format_header_value(value: &HeaderValue, out: &mut Vec<u8>) -> Result<(), SignerError> {
    out.push(value.type_tag());
    match value {
        HeaderValue::Boolean(_) => {}
        HeaderValue::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        HeaderValue::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        HeaderValue::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
        HeaderValue::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        HeaderValue::Binary(bytes) => push_length_prefixed(bytes, out)?,
        HeaderValue::String(s) => push_length_prefixed(s.as_bytes(), out)?,
        HeaderValue::Timestamp(ts) => out.extend_from_slice(&ts.timestamp_millis().to_be_bytes()),
        HeaderValue::Uuid(uuid) => {
            if !is_valid_uuid(uuid) {
                return Err(SignerError::InvalidEventHeader(format!(
                    "invalid UUID received: {}",
                    uuid
                )));
            }
            let raw = hex::decode(uuid.replace('-', ""))
                .map_err(|e| SignerError::InvalidEventHeader(e.to_string()))?;
            out.extend_from_slice(&raw);
        }
    }
    Ok(())
}

fn push_length_prefixed(bytes: &[u8], out: &mut Vec<u8>) -> Result<(), SignerError> {
    let len = u16::try_from(bytes.len()).map_err(|_| {
        SignerError::InvalidEventHeader(format!("header value too long: {}", bytes.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, lower-case hex only
fn is_valid_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
}
