//! Wire-level names and limits of the AWS Signature Version 4 scheme

pub const ALGORITHM_IDENTIFIER: &str = "AWS4-HMAC-SHA256";
pub const EVENT_ALGORITHM_IDENTIFIER: &str = "AWS4-HMAC-SHA256-PAYLOAD";
pub const KEY_TYPE_IDENTIFIER: &str = "aws4_request";

pub const ALGORITHM_QUERY_PARAM: &str = "X-Amz-Algorithm";
pub const CREDENTIAL_QUERY_PARAM: &str = "X-Amz-Credential";
pub const AMZ_DATE_QUERY_PARAM: &str = "X-Amz-Date";
pub const SIGNED_HEADERS_QUERY_PARAM: &str = "X-Amz-SignedHeaders";
pub const EXPIRES_QUERY_PARAM: &str = "X-Amz-Expires";
pub const SIGNATURE_QUERY_PARAM: &str = "X-Amz-Signature";
pub const TOKEN_QUERY_PARAM: &str = "X-Amz-Security-Token";

pub const AUTH_HEADER: &str = "authorization";
pub const AMZ_DATE_HEADER: &str = "x-amz-date";
pub const DATE_HEADER: &str = "date";
pub const SHA256_HEADER: &str = "x-amz-content-sha256";
pub const TOKEN_HEADER: &str = "x-amz-security-token";
pub const HOST_HEADER: &str = "host";

/// Headers stripped before every (re)signing
pub const GENERATED_HEADERS: [&str; 3] = [AUTH_HEADER, AMZ_DATE_HEADER, DATE_HEADER];

/// Headers never included in a signature unless explicitly allow-listed
pub const ALWAYS_UNSIGNABLE_HEADERS: [&str; 15] = [
    "authorization",
    "cache-control",
    "connection",
    "expect",
    "from",
    "keep-alive",
    "max-forwards",
    "pragma",
    "referer",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "x-amzn-trace-id",
];

/// Prefixes of header names that are unsignable in the same way
pub const UNSIGNABLE_PREFIXES: [&str; 2] = ["proxy-", "sec-"];

/// Headers with this prefix are moved into the query string when presigning
pub const HOISTABLE_PREFIX: &str = "x-amz-";

pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// SHA-256 of the empty string
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Signing keys kept per signer
pub const MAX_CACHE_SIZE: usize = 50;

/// Longest lifetime a presigned URL may have (one week)
pub const MAX_PRESIGNED_TTL: u64 = 60 * 60 * 24 * 7;
