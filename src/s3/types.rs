//! S3 types and response structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One object as shown to callers of the facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObjectSummary {
    /// Object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp as reported by the service
    pub last_modified: Option<String>,
}

impl StoredObjectSummary {
    pub fn new(key: String, size: u64) -> Self {
        Self {
            key,
            size,
            last_modified: None,
        }
    }
}

/// One page of a ListObjectsV2 response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListObjectsPage {
    pub contents: Vec<StoredObjectSummary>,
    /// Whether more pages follow
    pub is_truncated: bool,
    /// Continuation token for next request
    pub next_continuation_token: Option<String>,
    /// Prefix used in the request
    pub prefix: Option<String>,
    /// Key count in this response
    pub key_count: Option<u32>,
}

impl ListObjectsPage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What to do when the target name of an upload is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Probe `name(1).ext`, `name(2).ext`, ... until a free name is found
    #[default]
    Increment,
    /// Append `_{unix-millis}` once, without probing
    Timestamp,
    /// Overwrite the existing object
    Replace,
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "increment" | "" => Ok(UploadMode::Increment),
            "timestamp" | "rename" => Ok(UploadMode::Timestamp),
            "replace" | "overwrite" => Ok(UploadMode::Replace),
            other => Err(format!(
                "unknown upload mode '{}' (expected increment, timestamp or replace)",
                other
            )),
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadMode::Increment => "increment",
            UploadMode::Timestamp => "timestamp",
            UploadMode::Replace => "replace",
        };
        f.write_str(s)
    }
}

/// Result of an upload: the key the object actually landed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub file_name: String,
}
