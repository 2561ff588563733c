//! Command line behaviour of `gbq-pipeline`

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

fn gbq_pipeline(server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("gbq-pipeline").unwrap();
    for key in [
        "GCP_PROJECT",
        "GCP_REGION",
        "GBQ_DATASET",
        "GBQ_METADATA_URL",
        "GBQ_HTTP_TIMEOUT_SECS",
        "LOG_LEVEL",
        "LOG_OUTPUT",
        "LOG_FILTER",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("GBQ_API_BASE_URL", server.uri())
        .env("GBQ_ACCESS_TOKEN", "test-token")
        .env("GBQ_POLL_INTERVAL_MS", "10");
    cmd
}

async fn mock_successful_jobs(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/ansible-eg/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": {"state": "PENDING"}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/ansible-eg/jobs/gbq_load_"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": {"state": "DONE"},
            "statistics": {
                "startTime": "1700000000000",
                "endTime": "1700000002000",
                "load": {"outputRows": "10"}
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_help_lists_options() {
    let server = MockServer::start().await;
    gbq_pipeline(&server)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--uri"))
        .stdout(predicate::str::contains("--elements"))
        .stdout(predicate::str::contains("--parallelism"));
}

#[tokio::test]
async fn test_default_element_is_loaded() {
    let server = MockServer::start().await;
    mock_successful_jobs(&server).await;

    gbq_pipeline(&server)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 1 elements: 1 loaded, 0 skipped, 0 failed"));
}

#[tokio::test]
async fn test_uri_without_table_is_skipped() {
    let server = MockServer::start().await;
    mock_successful_jobs(&server).await;

    gbq_pipeline(&server)
        .args(["--uri", "gs://my_data_files/sample.parquet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 loaded, 1 skipped"));
}

#[tokio::test]
async fn test_elements_file() {
    let server = MockServer::start().await;
    mock_successful_jobs(&server).await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("elements.json");
    fs::write(
        &file,
        r#"[
            {"file_uris": ["gs://my_data_files/a.parquet"], "table_name": "a"},
            {"file_uris": ["gs://my_data_files/b.parquet"], "table_name": "b"},
            {"file_uris": [], "table_name": "c"}
        ]"#,
    )
    .unwrap();

    gbq_pipeline(&server)
        .arg("--elements")
        .arg(&file)
        .args(["--parallelism", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 3 elements: 2 loaded, 1 skipped, 0 failed"));
}

#[tokio::test]
async fn test_failed_load_does_not_fail_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    gbq_pipeline(&server)
        .args(["--uri", "gs://my_data_files/sample.parquet", "--table", "sample"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 loaded, 0 skipped, 1 failed"))
        .stderr(predicate::str::contains("backend error"));
}

#[tokio::test]
async fn test_zero_parallelism_is_rejected() {
    let server = MockServer::start().await;
    gbq_pipeline(&server)
        .args(["--parallelism", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallelism"));
}

#[tokio::test]
async fn test_elements_conflicts_with_uri() {
    let server = MockServer::start().await;
    gbq_pipeline(&server)
        .args(["--elements", "x.json", "--uri", "gs://b/x.parquet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
