//! s3filer - file manager for a single S3 bucket, with its own SigV4 signer

pub mod cli;
pub mod config;
pub mod core;
pub mod files;
pub mod s3;
pub mod server;

pub use core::Core;
pub use config::Config;
