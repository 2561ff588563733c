//! Cloud Storage backend
//!
//! Talks to the Cloud Storage XML API, which speaks the S3 protocol when
//! authenticated with HMAC keys. Requests are signed by `aws-sdk-s3`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{http::HttpResponse, Region, RequestChecksumCalculation, ResponseChecksumValidation},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    Client,
};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::ObjectStore;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct GcsObjectStore {
    client: Client,
}

/// One page of a bucket listing.
struct ObjectPage {
    names: Vec<String>,
    next_token: Option<String>,
}

impl GcsObjectStore {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        debug!(endpoint = %config.endpoint, region = %config.region, "Initializing object store");

        let builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "gbq-storage",
                )),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        // Cloud Storage rejects the flexible checksum headers the SDK sends
        // by default, so only send them when an operation demands it.
        let s3_config = builder
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(config.path_style)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        info!(endpoint = %config.endpoint, "Object store client initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    async fn list_page(&self, bucket: &str, continuation: Option<String>) -> Result<ObjectPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| classify(e, bucket, None))?;

        let names: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        debug!(
            count = names.len(),
            more = next_token.is_some(),
            "Fetched listing page for gs://{}",
            bucket
        );

        Ok(ObjectPage { names, next_token })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String>> {
        // None: listing finished. Some(None): first page. Some(Some(t)): resume at t.
        stream::try_unfold(Some(None), move |cursor: Option<Option<String>>| async move {
            let Some(continuation) = cursor else {
                return Ok::<_, StorageError>(None);
            };
            let page = self.list_page(bucket, continuation).await?;
            let next = page.next_token.map(Some);
            let names = stream::iter(page.names.into_iter().map(Ok::<_, StorageError>));
            Ok::<_, StorageError>(Some((names, next)))
        })
        .try_flatten()
        .boxed()
    }

    #[instrument(skip(self))]
    async fn read_object(&self, bucket: &str, object: &str) -> Result<String> {
        debug!("Reading gs://{}/{}", bucket, object);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(|e| classify(e, bucket, Some(object)))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| {
                StorageError::Request(format!(
                    "Failed to read body of gs://{}/{}: {}",
                    bucket, object, e
                ))
            })?
            .into_bytes();

        debug!(size = bytes.len(), "Read gs://{}/{}", bucket, object);

        String::from_utf8(bytes.to_vec()).map_err(|source| StorageError::InvalidText {
            bucket: bucket.to_string(),
            object: object.to_string(),
            source,
        })
    }

    #[instrument(skip(self, contents), fields(size = contents.len()))]
    async fn write_object(&self, bucket: &str, object: &str, contents: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(object)
            .content_type(TEXT_CONTENT_TYPE)
            .body(ByteStream::from(contents.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| classify(e, bucket, Some(object)))?;

        info!("Wrote gs://{}/{}", bucket, object);
        Ok(())
    }
}

fn classify<E>(err: SdkError<E, HttpResponse>, bucket: &str, object: Option<&str>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    classify_parts(code.as_deref(), status, bucket, object, message)
}

fn classify_parts(
    code: Option<&str>,
    status: Option<u16>,
    bucket: &str,
    object: Option<&str>,
    message: String,
) -> StorageError {
    let not_found = || match object {
        Some(object) => StorageError::NotFound {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        None => StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        },
    };

    match (code, status) {
        (Some("NoSuchBucket"), _) => StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        },
        (Some("NoSuchKey"), _) | (_, Some(404)) => not_found(),
        (
            Some("AccessDenied")
            | Some("InvalidAccessKeyId")
            | Some("SignatureDoesNotMatch")
            | Some("InvalidSecurity")
            | Some("UserProjectMissing"),
            _,
        )
        | (_, Some(401 | 403)) => StorageError::Auth {
            bucket: bucket.to_string(),
            message,
        },
        _ => StorageError::Request(message),
    }
}
