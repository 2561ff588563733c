//! Pipeline runs against a mocked BigQuery jobs API

use gbq_pipeline::warehouse::BigQueryClient;
use gbq_pipeline::{
    BigQueryConnector, LoadGcsUrisToBigQuery, LoadJob, LoadJobConfig, LoadOutcome, LoadRequest,
    Pipeline, PipelineOptions, RecordingObserver, TracingObserver, Warehouse, WarehouseConfig,
    WarehouseError,
};
use std::sync::Arc;
use wiremock::{
    matchers::{bearer_token, body_partial_json, method, path, path_regex, query_param},
    Mock, MockServer, ResponseTemplate,
};

const JOBS_PATH: &str = "/bigquery/v2/projects/ansible-eg/jobs";
const JOB_PATH_PATTERN: &str = r"^/bigquery/v2/projects/ansible-eg/jobs/gbq_load_[0-9a-f]{32}$";

fn config(server: &MockServer) -> WarehouseConfig {
    WarehouseConfig {
        api_base_url: server.uri(),
        access_token: Some("test-token".to_string()),
        poll_interval_ms: 10,
        ..WarehouseConfig::default()
    }
}

fn running_job() -> serde_json::Value {
    serde_json::json!({
        "jobReference": {"projectId": "ansible-eg", "jobId": "gbq_load_x", "location": "us-west1"},
        "status": {"state": "RUNNING"}
    })
}

fn done_job(rows: &str) -> serde_json::Value {
    serde_json::json!({
        "status": {"state": "DONE"},
        "statistics": {
            "startTime": "1700000000000",
            "endTime": "1700000007250",
            "load": {"outputRows": rows}
        }
    })
}

async fn run(
    config: WarehouseConfig,
    elements: Vec<LoadRequest>,
) -> (Vec<LoadRequest>, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let observer = Arc::new((TracingObserver, recorder.clone()));
    let pipeline = Pipeline::new(PipelineOptions { parallelism: 2 }).unwrap();

    let outputs = pipeline
        .run(elements, || {
            LoadGcsUrisToBigQuery::with_parts(
                config.clone(),
                Arc::new(BigQueryConnector),
                observer.clone(),
            )
        })
        .await
        .unwrap();
    (outputs, recorder)
}

#[tokio::test]
async fn test_elements_are_loaded_and_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .and(bearer_token("test-token"))
        .and(body_partial_json(serde_json::json!({
            "jobReference": {"projectId": "ansible-eg", "location": "us-west1"},
            "configuration": {"load": {
                "sourceUris": ["gs://my_data_files/sample.parquet"],
                "destinationTable": {
                    "projectId": "ansible-eg",
                    "datasetId": "ansible_eg",
                    "tableId": "sample"
                },
                "writeDisposition": "WRITE_APPEND",
                "createDisposition": "CREATE_IF_NEEDED",
                "sourceFormat": "PARQUET"
            }}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_job()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(JOB_PATH_PATTERN))
        .and(query_param("location", "us-west1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_job("1000")))
        .expect(1)
        .mount(&server)
        .await;

    let elements = vec![
        LoadRequest::new(["gs://my_data_files/sample.parquet"], "sample"),
        LoadRequest::new(Vec::<String>::new(), "empty"),
        LoadRequest::new(["gs://my_data_files/orphan.parquet"], ""),
    ];
    let (mut outputs, recorder) = run(config(&server), elements.clone()).await;

    outputs.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    let mut expected = elements;
    expected.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    assert_eq!(outputs, expected);

    let counts = recorder.counts();
    assert_eq!((counts.loaded, counts.skipped, counts.failed), (1, 2, 0));

    let loaded = recorder
        .outcomes()
        .into_iter()
        .find_map(|(_, outcome)| match outcome {
            LoadOutcome::Loaded { destination, stats } => Some((destination, stats)),
            _ => None,
        })
        .unwrap();
    assert_eq!(loaded.0.to_string(), "ansible-eg.ansible_eg.sample");
    assert_eq!(loaded.1.output_rows, 1000);
    assert_eq!(loaded.1.took_secs(), 7);
}

#[tokio::test]
async fn test_failed_job_is_reported_not_raised() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_job()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(JOB_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": {
                "state": "DONE",
                "errorResult": {
                    "reason": "notFound",
                    "message": "Not found: URI gs://my_data_files/missing.parquet"
                }
            },
            "statistics": {"startTime": "1700000000000", "endTime": "1700000001000"}
        })))
        .mount(&server)
        .await;

    let element = LoadRequest::new(["gs://my_data_files/missing.parquet"], "sample");
    let (outputs, recorder) = run(config(&server), vec![element.clone()]).await;

    assert_eq!(outputs, vec![element]);
    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1.severity(), tracing::Level::ERROR);
    match &outcomes[0].1 {
        LoadOutcome::Failed { error, .. } => {
            assert!(error.contains("notFound"));
            assert!(error.contains("missing.parquet"));
        },
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_api_error_is_reported_not_raised() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": 403,
                "message": "Access Denied: Project ansible-eg",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    let element = LoadRequest::new(["gs://my_data_files/sample.parquet"], "sample");
    let (outputs, recorder) = run(config(&server), vec![element.clone()]).await;

    assert_eq!(outputs, vec![element]);
    match &recorder.outcomes()[0].1 {
        LoadOutcome::Failed { error, .. } => {
            assert!(error.contains("403"));
            assert!(error.contains("Access Denied"));
        },
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_closed_client_refuses_jobs() {
    let server = MockServer::start().await;
    let client = BigQueryClient::new(config(&server)).unwrap();
    client.close().await;

    let job = LoadJob {
        source_uris: vec!["gs://my_data_files/sample.parquet".to_string()],
        destination: WarehouseConfig::default().table("sample"),
        config: LoadJobConfig::APPEND_PARQUET,
    };
    let err = client.run_load_job(&job).await.unwrap_err();
    assert!(matches!(err, WarehouseError::Closed));
}
