//! S3 client module with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing (header auth, presigned URLs, event streams)
//! - The file-manager facade over one bucket (list, upload, rename, ...)
//! - A transport seam with a hyper implementation and an in-memory bucket

pub mod canonical;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod event;
pub mod presign;
pub mod request;
pub mod signer;
pub mod signing_key;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{Endpoint, Result, S3Client, S3Error};
pub use credentials::Credentials;
pub use event::{HeaderValue, Message, SignableEvent, SignableMessage, SignedMessage};
pub use request::{Payload, QueryValue, RequestDescriptor};
pub use signer::{PresignOptions, Signable, SignatureV4, Signed, SignerError, SigningOptions};
pub use transport::{HttpResponse, HyperTransport, MemoryTransport, Transport};
pub use types::{ListObjectsPage, StoredObjectSummary, UploadMode, UploadOutcome};
