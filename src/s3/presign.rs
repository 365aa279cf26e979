//! S3-specific presign preparation
//!
//! S3 wants presigned URLs that a browser can use as-is: the payload is never
//! hashed, the content type is free for the uploader to choose and
//! server-side-encryption headers have to be sent as real headers.

use std::collections::HashSet;

use crate::s3::constants::{HOST_HEADER, SHA256_HEADER, UNSIGNED_PAYLOAD};
use crate::s3::credentials::Credentials;
use crate::s3::request::RequestDescriptor;
use crate::s3::signer::{PresignOptions, SignatureV4, SignerError};

/// SSE headers that must stay headers on a presigned request
pub const UNHOISTABLE_SSE_HEADERS: [&str; 5] = [
    "x-amz-server-side-encryption",
    "x-amz-server-side-encryption-aws-kms-key-id",
    "x-amz-server-side-encryption-customer-algorithm",
    "x-amz-server-side-encryption-customer-key",
    "x-amz-server-side-encryption-customer-key-md5",
];

/// Adjust a request and its options the way S3 expects before presigning
pub fn prepare_s3_presign(
    request: &RequestDescriptor,
    options: &PresignOptions,
) -> (RequestDescriptor, PresignOptions) {
    let mut request = request.clone();
    let mut options = options.clone();

    let unsignable = options.unsignable_headers.get_or_insert_with(HashSet::new);
    unsignable.insert("content-type".to_string());

    let unhoistable = options.unhoistable_headers.get_or_insert_with(HashSet::new);
    unhoistable.extend(UNHOISTABLE_SSE_HEADERS.iter().map(|h| h.to_string()));

    request.remove_header(SHA256_HEADER);
    request
        .headers
        .insert("X-Amz-Content-Sha256".to_string(), UNSIGNED_PAYLOAD.to_string());

    request.remove_header(HOST_HEADER);
    request.headers.insert(HOST_HEADER.to_string(), request.authority());

    (request, options)
}

/// Prepare and presign a request for S3, returning the ready-to-use URL
pub fn presign_s3_url(
    signer: &SignatureV4,
    request: &RequestDescriptor,
    credentials: &Credentials,
    options: &PresignOptions,
) -> Result<String, SignerError> {
    let (request, options) = prepare_s3_presign(request, options);
    let presigned = signer.presign(&request, credentials, &options)?;
    Ok(presigned.format_url())
}
