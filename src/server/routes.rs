use hyper::Method;
use std::collections::HashMap;

use crate::s3::types::UploadMode;

/// API operation extracted from an HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRoute {
    Health,
    /// `folder` absent: flat listing; present (even empty): grouped view
    ListFiles { folder: Option<String> },
    FileExists { name: String },
    Upload { name: String, mode: Option<UploadMode> },
    Delete { key: String },
    Rename,
    DownloadUrl { key: String, expires_in: Option<u64> },
    /// Known path, unusable parameters
    BadRequest(String),
    Unknown { method: String, path: String },
}

impl ApiRoute {
    /// Route a request by method, raw path and raw query string
    pub fn from_parts(method: &Method, path: &str, query: Option<&str>) -> Self {
        let params = parse_query(query.unwrap_or(""));
        let unknown = || ApiRoute::Unknown {
            method: method.to_string(),
            path: path.to_string(),
        };

        match (method, path) {
            (&Method::GET, "/health") => ApiRoute::Health,
            (&Method::GET, "/api/files") => ApiRoute::ListFiles {
                folder: params.get("folder").cloned(),
            },
            (&Method::GET, "/api/files/exists") => match params.get("name") {
                Some(name) if !name.is_empty() => ApiRoute::FileExists { name: name.clone() },
                _ => ApiRoute::BadRequest("missing 'name' parameter".to_string()),
            },
            (&Method::POST, "/api/rename") => ApiRoute::Rename,
            (&Method::GET, "/api/download-url") => {
                let key = match params.get("key") {
                    Some(key) if !key.is_empty() => key.clone(),
                    _ => return ApiRoute::BadRequest("missing 'key' parameter".to_string()),
                };
                match params.get("expiresIn").map(|v| v.parse::<u64>()) {
                    None => ApiRoute::DownloadUrl { key, expires_in: None },
                    Some(Ok(secs)) => ApiRoute::DownloadUrl {
                        key,
                        expires_in: Some(secs),
                    },
                    Some(Err(_)) => ApiRoute::BadRequest("invalid 'expiresIn' parameter".to_string()),
                }
            }
            (&Method::PUT, _) | (&Method::DELETE, _) => {
                let Some(encoded) = path.strip_prefix("/api/files/") else {
                    return unknown();
                };
                let key = match urlencoding::decode(encoded) {
                    Ok(key) if !key.is_empty() => key.into_owned(),
                    _ => return ApiRoute::BadRequest("invalid file name".to_string()),
                };
                if method == Method::DELETE {
                    return ApiRoute::Delete { key };
                }
                match params.get("mode").map(|m| m.parse::<UploadMode>()) {
                    None => ApiRoute::Upload { name: key, mode: None },
                    Some(Ok(mode)) => ApiRoute::Upload {
                        name: key,
                        mode: Some(mode),
                    },
                    Some(Err(e)) => ApiRoute::BadRequest(e),
                }
            }
            _ => unknown(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ApiRoute::Health => "health",
            ApiRoute::ListFiles { .. } => "list_files",
            ApiRoute::FileExists { .. } => "file_exists",
            ApiRoute::Upload { .. } => "upload",
            ApiRoute::Delete { .. } => "delete",
            ApiRoute::Rename => "rename",
            ApiRoute::DownloadUrl { .. } => "download_url",
            ApiRoute::BadRequest(_) => "bad_request",
            ApiRoute::Unknown { .. } => "unknown",
        }
    }
}

/// Decode `a=1&b=x%20y` (and `+` as space) into a map; later keys win
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = urlencoding::decode(&k.replace('+', " ")).ok()?.into_owned();
            let v = urlencoding::decode(&v.replace('+', " ")).ok()?.into_owned();
            Some((k, v))
        })
        .collect()
}
