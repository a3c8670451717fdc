//! Object store client.
//!
//! `ObjectStore` is the seam the HTTP layer talks to; `S3ObjectStore` is the
//! production implementation over `aws-sdk-s3`. Every operation is a single
//! SDK attempt with the SDK retry policy disabled: failures surface
//! immediately to the caller.

use crate::config::AppConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig, retry::RetryConfig};
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Config as S3Config},
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    primitives::ByteStream,
};
use bytes::Bytes;
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object store failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-addressed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// Read the full object stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;
}

/// S3 bucket client.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the standard AWS provider chain (region, credentials).
    pub async fn new(cfg: &AppConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        info!(
            bucket = %cfg.bucket,
            endpoint = cfg.s3_endpoint_url.as_deref().unwrap_or("aws"),
            "S3 client initialized"
        );

        Self {
            client: Client::from_conf(client_config(&aws_config, cfg)),
            bucket: cfg.bucket.clone(),
        }
    }
}

/// S3 client settings: one attempt per call, and path-style addressing
/// when a custom endpoint (MinIO/LocalStack) is configured.
fn client_config(aws_config: &SdkConfig, cfg: &AppConfig) -> S3Config {
    let mut builder = S3ConfigBuilder::from(aws_config).retry_config(RetryConfig::disabled());
    if let Some(endpoint_url) = cfg.s3_endpoint_url.as_deref() {
        builder = builder.endpoint_url(endpoint_url).force_path_style(true);
    }
    builder.build()
}

/// `NoSuchKey` becomes `NotFound`; every other failure is a backend error.
fn map_get_error<R>(key: &str, err: &SdkError<GetObjectError, R>) -> StoreError
where
    R: Debug + 'static,
{
    match err.as_service_error() {
        Some(service_err) if service_err.is_no_such_key() => {
            debug!(key, "get_object: no such key");
            StoreError::NotFound(key.to_string())
        }
        _ => {
            let msg = DisplayErrorContext(err).to_string();
            warn!(key, error = %msg, "get_object failed");
            StoreError::Backend(msg)
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, size_bytes = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                let msg = DisplayErrorContext(&err).to_string();
                warn!(key, error = %msg, "put_object failed");
                StoreError::Backend(msg)
            })?;

        debug!(key, "put_object succeeded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_get_error(key, &err))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|err| StoreError::Backend(format!("reading object body: {}", err)))?
            .into_bytes();

        debug!(key, size_bytes = data.len(), "get_object succeeded");
        Ok(data)
    }
}


#[cfg(test)]
mod tests {
    use super::{memory::MemoryObjectStore, *};

    #[tokio::test]
    async fn put_then_get_returns_same_bytes() {
        let store = MemoryObjectStore::default();
        store.put("a.txt", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let store = MemoryObjectStore::default();
        store.put("a.txt", Bytes::from_static(b"hello")).await.unwrap();
        store.put("a.txt", Bytes::from_static(b"world")).await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap(), Bytes::from_static(b"world"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = MemoryObjectStore::default();
        let err = store.get("missing.bin").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref key) if key == "missing.bin"));
    }

    #[tokio::test]
    async fn keys_are_stored_verbatim() {
        let store = MemoryObjectStore::default();
        store.put("../x", Bytes::from_static(b"raw")).await.unwrap();
        assert_eq!(store.get("../x").await.unwrap(), Bytes::from_static(b"raw"));
    }

    fn test_config(endpoint: Option<&str>) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            bucket: "test-bucket".into(),
            s3_endpoint_url: endpoint.map(str::to_owned),
            db_host: "localhost".into(),
            db_port: 5432,
            db_user: "app".into(),
            db_password: "app".into(),
            db_name: "appdb".into(),
        }
    }

    fn sdk_config() -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .build()
    }

    #[test]
    fn client_makes_a_single_attempt() {
        let conf = client_config(&sdk_config(), &test_config(None));
        assert_eq!(conf.retry_config().map(|r| r.max_attempts()), Some(1));
    }

    #[test]
    fn custom_endpoint_keeps_retries_disabled() {
        let conf = client_config(&sdk_config(), &test_config(Some("http://localhost:9000")));
        assert_eq!(conf.retry_config().map(|r| r.max_attempts()), Some(1));
    }

    #[test]
    fn no_such_key_maps_to_not_found() {
        use aws_sdk_s3::types::error::NoSuchKey;

        let err: SdkError<GetObjectError, ()> =
            SdkError::service_error(GetObjectError::NoSuchKey(NoSuchKey::builder().build()), ());
        assert!(matches!(
            map_get_error("a.txt", &err),
            StoreError::NotFound(ref key) if key == "a.txt"
        ));
    }

    #[test]
    fn other_get_failures_map_to_backend() {
        use aws_sdk_s3::types::error::InvalidObjectState;

        let service: SdkError<GetObjectError, ()> = SdkError::service_error(
            GetObjectError::InvalidObjectState(InvalidObjectState::builder().build()),
            (),
        );
        assert!(matches!(map_get_error("a.txt", &service), StoreError::Backend(_)));

        let timeout: SdkError<GetObjectError, ()> = SdkError::timeout_error("request timed out");
        assert!(matches!(map_get_error("a.txt", &timeout), StoreError::Backend(_)));
    }
}
