//! File-manager operations against the in-memory bucket

use async_trait::async_trait;
use bytes::Bytes;
use hyper::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use s3filer::s3::{
    Credentials, Endpoint, HttpResponse, MemoryTransport, QueryValue, RequestDescriptor, S3Client,
    S3Error, SignerError, Transport, UploadMode,
};

const BUCKET: &str = "files";

fn setup(endpoint: Endpoint) -> (S3Client, MemoryTransport) {
    let transport = MemoryTransport::new(BUCKET);
    let client = S3Client::new(
        BUCKET,
        "us-east-2",
        Credentials::new("AKIDEXAMPLE", "secret"),
        endpoint,
        Arc::new(transport.clone()),
    );
    (client, transport)
}

fn path_style() -> (S3Client, MemoryTransport) {
    setup(Endpoint::custom("http://localhost:9000").unwrap())
}

#[tokio::test]
async fn test_every_request_is_signed() {
    let (client, transport) = setup(Endpoint::aws(BUCKET, "us-east-2"));
    client.put_object("a.txt", Bytes::from_static(b"hello"), None).await.unwrap();
    client.object_exists("a.txt").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.hostname, "files.s3.us-east-2.amazonaws.com");
        assert_eq!(request.header("host"), Some("files.s3.us-east-2.amazonaws.com"));
        let auth = request.header("authorization").unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(auth.contains("/us-east-2/s3/aws4_request"));
        assert!(request.has_header("x-amz-date"));
        assert!(request.has_header("x-amz-content-sha256"));
    }
}

#[tokio::test]
async fn test_put_sends_content_md5_and_type() {
    let (client, transport) = path_style();
    client
        .put_object("docs/a b.txt", Bytes::from_static(b"hello"), Some("text/plain"))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.path, "/files/docs/a%20b.txt");
    assert_eq!(request.header("content-md5"), Some("XUFAKrxLKna5cZ2REBfFkg=="));
    assert_eq!(request.header("content-type"), Some("text/plain"));
    assert_eq!(
        request.header("x-amz-content-sha256"),
        Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
    );
    assert_eq!(transport.get("docs/a b.txt").unwrap(), Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn test_object_exists() {
    let (client, transport) = path_style();
    transport.insert("present.txt", "x");

    assert!(client.object_exists("present.txt").await.unwrap());
    assert!(!client.object_exists("absent.txt").await.unwrap());

    // Anything other than 404 propagates
    transport.fail("HEAD", "secret.txt", StatusCode::FORBIDDEN, "");
    assert!(matches!(
        client.object_exists("secret.txt").await,
        Err(S3Error::S3Response { status: StatusCode::FORBIDDEN, .. })
    ));
}

#[tokio::test]
async fn test_list_follows_continuation_tokens() {
    let (client, transport) = path_style();
    let client = client.with_page_size(2);
    for key in ["a.txt", "b.txt", "c/d.txt", "c/e.txt", "f.txt"] {
        transport.insert(key, "data");
    }

    let objects = client.list_objects(None).await.unwrap();
    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["a.txt", "b.txt", "c/d.txt", "c/e.txt", "f.txt"]);
    assert!(objects.iter().all(|o| o.size == 4));
    assert_eq!(transport.requests().len(), 3);

    let second_page = &transport.requests()[1];
    assert_eq!(
        second_page.query_value("continuation-token"),
        Some(&QueryValue::Single("b.txt".to_string()))
    );

    let under_c = client.list_objects(Some("c/")).await.unwrap();
    assert_eq!(under_c.len(), 2);
}

#[tokio::test]
async fn test_list_keeps_surrounding_whitespace_in_keys() {
    let (client, transport) = path_style();
    transport.insert(" lead.txt", "a");
    transport.insert("trail.txt ", "b");

    let objects = client.list_objects(None).await.unwrap();
    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec![" lead.txt", "trail.txt "]);

    for key in keys {
        assert!(client.object_exists(key).await.unwrap());
    }
}

/// Server that answers every listing with the same truncated page
struct StuckListing {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for StuckListing {
    async fn send(&self, _request: RequestDescriptor) -> s3filer::s3::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::new(
            StatusCode::OK,
            "<ListBucketResult><IsTruncated>true</IsTruncated>\
             <NextContinuationToken>same</NextContinuationToken>\
             <Contents><Key>a.txt</Key><Size>1</Size></Contents></ListBucketResult>",
        ))
    }
}

#[tokio::test]
async fn test_list_stops_on_repeated_continuation_token() {
    let transport = Arc::new(StuckListing {
        calls: AtomicUsize::new(0),
    });
    let client = S3Client::new(
        BUCKET,
        "us-east-2",
        Credentials::new("AKIDEXAMPLE", "secret"),
        Endpoint::custom("http://localhost:9000").unwrap(),
        transport.clone(),
    );

    let err = client.list_objects(None).await.unwrap_err();
    assert!(matches!(err, S3Error::S3Response { .. }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_upload_increment_finds_free_name() {
    let (client, transport) = path_style();
    transport.insert("report.pdf", "v0");
    transport.insert("report(1).pdf", "v1");

    let outcome = client
        .upload("report.pdf", Bytes::from_static(b"v2"), None, UploadMode::Increment)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.file_name, "report(2).pdf");
    assert_eq!(transport.get("report(2).pdf").unwrap(), Bytes::from_static(b"v2"));
    assert_eq!(transport.get("report.pdf").unwrap(), Bytes::from_static(b"v0"));
}

#[tokio::test]
async fn test_upload_increment_free_name_is_kept() {
    let (client, transport) = path_style();
    let outcome = client
        .upload("uploads/new.txt", Bytes::from_static(b"x"), None, UploadMode::default())
        .await
        .unwrap();
    assert_eq!(outcome.file_name, "uploads/new.txt");
    assert!(transport.contains("uploads/new.txt"));
}

#[tokio::test]
async fn test_upload_increment_is_bounded() {
    let (client, transport) = path_style();
    let client = client.with_max_name_attempts(3);
    for key in ["a.txt", "a(1).txt", "a(2).txt", "a(3).txt"] {
        transport.insert(key, "taken");
    }

    let err = client
        .upload("a.txt", Bytes::from_static(b"new"), None, UploadMode::Increment)
        .await
        .unwrap_err();
    match err {
        S3Error::NameCollisionExhausted { file_name, attempts } => {
            assert_eq!(file_name, "a.txt");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // Nothing was written
    assert_eq!(transport.keys().len(), 4);
}

#[tokio::test]
async fn test_upload_timestamp_and_replace() {
    let (client, transport) = path_style();
    transport.insert("photo.jpg", "old");

    let outcome = client
        .upload("photo.jpg", Bytes::from_static(b"new"), None, UploadMode::Timestamp)
        .await
        .unwrap();
    let stamp = outcome
        .file_name
        .strip_prefix("photo_")
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .unwrap();
    assert!(stamp.parse::<i64>().unwrap() > 1_600_000_000_000);
    assert_eq!(transport.get("photo.jpg").unwrap(), Bytes::from_static(b"old"));
    // No existence probe for timestamped uploads
    assert!(transport.requests().iter().all(|r| r.method != "HEAD"));

    let outcome = client
        .upload("photo.jpg", Bytes::from_static(b"replaced"), None, UploadMode::Replace)
        .await
        .unwrap();
    assert_eq!(outcome.file_name, "photo.jpg");
    assert_eq!(transport.get("photo.jpg").unwrap(), Bytes::from_static(b"replaced"));
}

#[tokio::test]
async fn test_rename_moves_object() {
    let (client, transport) = path_style();
    transport.insert("old name.txt", "content");

    client.rename_object("old name.txt", "archive/new name.txt").await.unwrap();

    assert!(!transport.contains("old name.txt"));
    assert_eq!(
        transport.get("archive/new name.txt").unwrap(),
        Bytes::from_static(b"content")
    );

    let copy = transport
        .requests()
        .into_iter()
        .find(|r| r.has_header("x-amz-copy-source"))
        .unwrap();
    assert_eq!(copy.header("x-amz-copy-source"), Some("files/old%20name.txt"));
}

#[tokio::test]
async fn test_rename_to_same_key_is_noop() {
    let (client, transport) = path_style();
    transport.insert("a.txt", "x");
    client.rename_object("a.txt", "a.txt").await.unwrap();
    assert!(transport.requests().is_empty());
    assert!(transport.contains("a.txt"));
}

#[tokio::test]
async fn test_rename_with_failed_delete_is_partial() {
    let (client, transport) = path_style();
    transport.insert("a.txt", "x");
    transport.fail("DELETE", "a.txt", StatusCode::FORBIDDEN, "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>");

    let err = client.rename_object("a.txt", "b.txt").await.unwrap_err();
    match err {
        S3Error::PartialRename { from, to, source } => {
            assert_eq!(from, "a.txt");
            assert_eq!(to, "b.txt");
            assert!(source.to_string().contains("AccessDenied"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // Both copies remain
    assert!(transport.contains("a.txt"));
    assert!(transport.contains("b.txt"));
}

#[tokio::test]
async fn test_copy_error_in_ok_body() {
    let (client, transport) = path_style();
    transport.insert("a.txt", "x");
    transport.fail(
        "PUT",
        "b.txt",
        StatusCode::OK,
        "<Error><Code>InternalError</Code><Message>We encountered an internal error.</Message></Error>",
    );

    let err = client.rename_object("a.txt", "b.txt").await.unwrap_err();
    assert!(matches!(err, S3Error::S3Response { status: StatusCode::OK, .. }));
    // The copy failed, so the original is untouched
    assert!(transport.contains("a.txt"));
}

#[tokio::test]
async fn test_delete_and_missing_copy_source() {
    let (client, transport) = path_style();
    transport.insert("a.txt", "x");
    client.delete_object("a.txt").await.unwrap();
    assert!(!transport.contains("a.txt"));

    assert!(matches!(
        client.copy_object("ghost.txt", "b.txt").await,
        Err(S3Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_keys_are_rejected_before_sending() {
    let (client, transport) = path_style();
    assert!(matches!(
        client.upload("", Bytes::new(), None, UploadMode::Replace).await,
        Err(S3Error::InvalidKey(_))
    ));
    assert!(matches!(client.delete_object("").await, Err(S3Error::InvalidKey(_))));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_presigned_urls() {
    let (client, transport) = setup(Endpoint::aws(BUCKET, "us-east-2"));

    let url = client.presigned_get_url("docs/q1 report.pdf", 900).unwrap();
    assert!(url.starts_with("https://files.s3.us-east-2.amazonaws.com/docs/q1%20report.pdf?"));
    assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
    assert!(url.contains("X-Amz-Credential=AKIDEXAMPLE%2F"));
    assert!(url.contains("X-Amz-Expires=900"));
    assert!(url.contains("X-Amz-SignedHeaders=host"));
    assert!(url.contains("X-Amz-Content-Sha256=UNSIGNED-PAYLOAD"));
    assert!(url.contains("X-Amz-Signature="));

    let put_url = client
        .presigned_put_url("uploads/new.png", 300, Some("image/png"))
        .unwrap();
    // content-type is left out of the signature
    assert!(put_url.contains("X-Amz-SignedHeaders=host&") || put_url.ends_with("X-Amz-SignedHeaders=host"));

    assert!(matches!(
        client.presigned_get_url("a.txt", 604_801),
        Err(S3Error::Signer(SignerError::ExpiryTooLarge { expires_in: 604_801 }))
    ));

    // Presigning never touches the network
    assert!(transport.requests().is_empty());
}
