//! Command implementations for the s3filer CLI
//!
//! Each command is a thin layer over one [`Core`] operation that prints a
//! human-readable result on stdout. Diagnostics go to stderr via tracing.

use anyhow::{Context, Result};
use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as FmtWrite;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::core::Core;
use crate::files::{format_size, FolderView};
use crate::s3::types::{StoredObjectSummary, UploadMode};

/// List the bucket like the file browser does: folders first, then files
pub async fn cmd_ls(core: &Core, folder: Option<&str>, all: bool, json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    if all {
        let objects = core.list_files().await?;
        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&objects)?)?;
        } else {
            out.write_all(render_objects(&objects).as_bytes())?;
            if objects.is_empty() {
                writeln!(out, "No objects found")?;
            }
        }
    } else {
        let view = core.folder_view(folder).await?;
        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        } else {
            out.write_all(render_folder_view(&view).as_bytes())?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Upload a local file, resolving name collisions according to `mode`
pub async fn cmd_upload(
    core: &Core,
    path: &Path,
    name: Option<&str>,
    mode: Option<UploadMode>,
) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .context(format!("Failed to read {}", path.display()))?;

    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context(format!("{} has no file name", path.display()))?,
    };
    let content_type = content_type_for(&name);
    let size = data.len() as u64;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Uploading {} ({})", name, format_size(size)));

    let result = core.upload(&name, Bytes::from(data), Some(content_type), mode).await;
    match result {
        Ok(outcome) => {
            pb.finish_with_message("Upload complete");
            if outcome.file_name != name {
                println!("{} -> {} (renamed, '{}' was taken)", path.display(), outcome.file_name, name);
            } else {
                println!("{} -> {}", path.display(), outcome.file_name);
            }
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Upload failed");
            Err(e)
        }
    }
}

pub async fn cmd_rm(core: &Core, key: &str) -> Result<()> {
    core.delete(key).await?;
    println!("Deleted: {}", key);
    Ok(())
}

/// Renaming a key to itself succeeds without touching the bucket
pub async fn cmd_mv(core: &Core, from: &str, to: &str) -> Result<()> {
    core.rename(from, to).await?;
    println!("{} -> {}", from, to);
    Ok(())
}

/// Print a presigned download link
pub fn cmd_url(core: &Core, key: &str, expires: Option<u64>) -> Result<()> {
    println!("{}", core.download_url(key, expires)?);
    Ok(())
}

/// `[DIR]` lines for folders, then one line per file
pub fn render_folder_view(view: &FolderView) -> String {
    let mut out = String::with_capacity(64 * (view.folders.len() + view.files.len() + 1));
    if let Some(folder) = &view.current_folder {
        let _ = writeln!(out, "{}/", folder);
    }
    for folder in &view.folders {
        let _ = writeln!(out, "{:>12}  {:<24}  {}/", "[DIR]", "", folder);
    }
    out.push_str(&render_objects(&view.files));
    if view.is_empty() {
        out.push_str("No files found\n");
    }
    out
}

/// One `size  last-modified  key` line per object
pub fn render_objects(objects: &[StoredObjectSummary]) -> String {
    let mut out = String::with_capacity(64 * objects.len());
    for object in objects {
        let _ = writeln!(
            out,
            "{:>12}  {:<24}  {}",
            format_size(object.size),
            object.last_modified.as_deref().unwrap_or("-"),
            object.key
        );
    }
    out
}

/// Content type from the file extension, `application/octet-stream` otherwise
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::s3::MemoryTransport;
    use std::sync::Arc;

    fn object(key: &str, size: u64) -> StoredObjectSummary {
        StoredObjectSummary {
            key: key.to_string(),
            size,
            last_modified: Some("2026-01-15T10:30:00.000Z".to_string()),
        }
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("docs/report.pdf"), "application/pdf");
        assert_eq!(content_type_for("Makefile"), "application/octet-stream");
        assert_eq!(content_type_for("archive.tar.gz"), "application/gzip");
    }

    #[test]
    fn test_render_root_view() {
        let objects = vec![object("readme.md", 1536), object("uploads/a.png", 10)];
        let rendered = render_folder_view(&FolderView::build(&objects, None));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[DIR]"));
        assert!(lines[0].ends_with("uploads/"));
        assert!(lines[1].contains("1.5 KB"));
        assert!(lines[1].ends_with("readme.md"));
    }

    #[test]
    fn test_render_empty_folder() {
        let rendered = render_folder_view(&FolderView::build(&[], Some("empty")));
        assert_eq!(rendered, "empty/\nNo files found\n");
    }

    fn memory_core() -> (Core, MemoryTransport) {
        let config: Config = serde_yaml::from_str(
            "storage:\n  bucket: files\n  access_key_id: key\n  secret_access_key: secret\n  endpoint: http://localhost:9000\n",
        )
        .unwrap();
        let transport = MemoryTransport::new("files");
        let core = Core::with_transport(config, Arc::new(transport.clone())).unwrap();
        (core, transport)
    }

    #[tokio::test]
    async fn test_cmd_mv() {
        let (core, transport) = memory_core();
        transport.insert("a.txt", "x");

        cmd_mv(&core, "a.txt", "a.txt").await.unwrap();
        assert!(transport.requests().is_empty());

        cmd_mv(&core, "a.txt", "b.txt").await.unwrap();
        assert!(transport.contains("b.txt"));
        assert!(!transport.contains("a.txt"));
    }
}
