//! CLI commands for s3filer
//!
//! ```bash
//! # Browse the bucket root, or one folder
//! s3filer ls
//! s3filer ls --folder uploads
//!
//! # Upload; a taken name becomes report(1).pdf, report(2).pdf, ...
//! s3filer upload ./report.pdf --name uploads/report.pdf
//!
//! # Rename, delete, share
//! s3filer mv uploads/report.pdf archive/report.pdf
//! s3filer rm archive/report.pdf
//! s3filer url uploads/photo.jpg --expires 600
//!
//! # HTTP API for the web UI
//! s3filer serve --listen 0.0.0.0:3000
//! ```

pub mod commands;
