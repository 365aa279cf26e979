//! File-manager views over a flat object listing
//!
//! Buckets have no directories; "folders" are the first `/`-separated
//! segment of a key. This module turns a listing into what a file browser
//! shows, and generates the alternative names used when an upload would
//! overwrite an existing object.

use serde::{Deserialize, Serialize};

use crate::s3::types::StoredObjectSummary;

/// What a file browser shows for one folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderView {
    /// `None` at the root
    pub current_folder: Option<String>,
    /// Top-level folder names (only listed at the root)
    pub folders: Vec<String>,
    pub files: Vec<StoredObjectSummary>,
}

impl FolderView {
    /// Group a full listing for display
    ///
    /// At the root (`None` or empty) the view holds every distinct top-level
    /// folder and the keys without a `/`. Inside a folder it holds every key
    /// under `folder/`, nested ones included, and no sub-folders.
    pub fn build(objects: &[StoredObjectSummary], current_folder: Option<&str>) -> Self {
        let current = current_folder
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty());

        match current {
            None => {
                let mut folders: Vec<String> = Vec::new();
                for object in objects {
                    if let Some((folder, _)) = object.key.split_once('/') {
                        if !folders.iter().any(|f| f == folder) {
                            folders.push(folder.to_string());
                        }
                    }
                }
                let files = objects
                    .iter()
                    .filter(|o| !o.key.contains('/'))
                    .cloned()
                    .collect();
                Self {
                    current_folder: None,
                    folders,
                    files,
                }
            }
            Some(folder) => {
                let prefix = format!("{}/", folder);
                let files = objects
                    .iter()
                    .filter(|o| o.key.starts_with(&prefix))
                    .cloned()
                    .collect();
                Self {
                    current_folder: Some(folder.to_string()),
                    folders: Vec::new(),
                    files,
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`
///
/// Powers of 1024, at most two decimals with trailing zeros dropped. Sizes
/// past the gigabyte range stay in GB.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// Split a key into `(base, extension)` at the last `.` of its final segment
///
/// The extension keeps its dot. A leading dot (`.env`) is not an extension,
/// and dots in folder names are ignored.
pub fn split_extension(key: &str) -> (&str, &str) {
    let name_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[name_start..].rfind('.') {
        Some(dot) if dot > 0 => key.split_at(name_start + dot),
        _ => (key, ""),
    }
}

/// `report.pdf` → `report(3).pdf`
pub fn increment_name(key: &str, counter: u32) -> String {
    let (base, ext) = split_extension(key);
    format!("{}({}){}", base, counter, ext)
}

/// `report.pdf` → `report_1767225600000.pdf`
pub fn timestamp_name(key: &str, unix_millis: i64) -> String {
    let (base, ext) = split_extension(key);
    format!("{}_{}{}", base, unix_millis, ext)
}
