//! `GcsObjectStore` against a mocked XML API endpoint
//!
//! Runs without credentials or network access. The mock speaks just enough
//! of the S3 dialect for listing, reads, writes and error responses.

use futures::TryStreamExt;
use gbq_storage::{config::StorageConfig, GcsObjectStore, ObjectStore, StorageError};
use wiremock::{
    matchers::{body_string, method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

const BUCKET: &str = "my_data_files";

async fn store(server: &MockServer) -> GcsObjectStore {
    let config = StorageConfig::with_hmac(server.uri(), "GOOG1EXAMPLE", "test-secret");
    GcsObjectStore::new(config).await.unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

fn listing_page(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <Size>11</Size><StorageClass>STANDARD</StorageClass></Contents>",
                key
            )
        })
        .collect();
    let continuation = next_token
        .map(|token| format!("<NextContinuationToken>{}</NextContinuationToken>", token))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
<Name>{bucket}</Name><Prefix></Prefix><KeyCount>{count}</KeyCount><MaxKeys>1000</MaxKeys>
<IsTruncated>{truncated}</IsTruncated>{continuation}{contents}
</ListBucketResult>"#,
        bucket = BUCKET,
        count = keys.len(),
        truncated = next_token.is_some(),
    )
}

fn s3_error(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>{}</Code><Message>{}</Message></Error>"#,
        code, message
    )
}

fn xml(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

#[tokio::test]
async fn test_listing_is_lazy_and_follows_continuation_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("list-type", "2"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(xml(200, listing_page(&["a", "b"], Some("tok1"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("list-type", "2"))
        .and(query_param("continuation-token", "tok1"))
        .respond_with(xml(200, listing_page(&["c"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server).await;
    let mut names = store.list_objects(BUCKET);
    assert_eq!(request_count(&server).await, 0);

    assert_eq!(names.try_next().await.unwrap().as_deref(), Some("a"));
    assert_eq!(names.try_next().await.unwrap().as_deref(), Some("b"));
    assert_eq!(request_count(&server).await, 1);

    let rest: Vec<String> = names.try_collect().await.unwrap();
    assert_eq!(rest, vec!["c"]);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_empty_bucket_lists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .respond_with(xml(200, listing_page(&[], None)))
        .mount(&server)
        .await;

    let store = store(&server).await;
    let names: Vec<String> = store.list_objects(BUCKET).try_collect().await.unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn test_write_then_read() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/greeting.txt", BUCKET)))
        .and(body_string("Hello world"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc\""))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{}/greeting.txt", BUCKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=utf-8")
                .set_body_string("Hello world"),
        )
        .mount(&server)
        .await;

    let store = store(&server).await;
    store.write_object(BUCKET, "greeting.txt", "Hello world").await.unwrap();
    assert_eq!(store.read_object(BUCKET, "greeting.txt").await.unwrap(), "Hello world");

    let put = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.method.as_str() == "PUT")
        .unwrap();
    let content_type = put.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/missing.txt", BUCKET)))
        .respond_with(xml(404, s3_error("NoSuchKey", "The specified key does not exist.")))
        .mount(&server)
        .await;

    let err = store(&server).await.read_object(BUCKET, "missing.txt").await.unwrap_err();
    match err {
        StorageError::NotFound { bucket, object } => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(object, "missing.txt");
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_bucket_on_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/no_such_bucket"))
        .respond_with(xml(404, s3_error("NoSuchBucket", "The specified bucket does not exist.")))
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .list_objects("no_such_bucket")
        .try_collect::<Vec<String>>()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::BucketNotFound { ref bucket } if bucket == "no_such_bucket"
    ));
}

#[tokio::test]
async fn test_access_denied_is_auth() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(xml(403, s3_error("AccessDenied", "Access denied.")))
        .mount(&server)
        .await;

    let err = store(&server)
        .await
        .write_object(BUCKET, "greeting.txt", "Hello world")
        .await
        .unwrap_err();
    assert!(err.is_auth(), "{err:?}");
}

#[tokio::test]
async fn test_non_utf8_object_is_invalid_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/blob.bin", BUCKET)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
        .mount(&server)
        .await;

    let err = store(&server).await.read_object(BUCKET, "blob.bin").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidText { .. }), "{err:?}");
}
