//! S3-compatible backend (Cloudflare R2) on top of opendal
//!
//! One operator per bucket, path-style addressing against the configured
//! endpoint.

use async_trait::async_trait;
use opendal::layers::RetryLayer;
use opendal::{ErrorKind, Operator, services};
use tracing::debug;
use url::Url;

use super::{Bucket, CACHE_CONTROL, ObjectStorage, StorageError};
use crate::config::StorageConfig;

const RETRY_TIMES: usize = 3;

#[derive(Debug, Clone)]
pub struct S3Storage {
    original: Operator,
    blurred: Operator,
}

impl S3Storage {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = config
            .resolved_endpoint()
            .ok_or_else(|| StorageError::NotConfigured("R2_ACCOUNT_ID or R2_ENDPOINT".into()))?;
        let parsed =
            Url::parse(&endpoint).map_err(|e| StorageError::InvalidEndpoint(e.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(StorageError::InvalidEndpoint(endpoint));
        }
        let access_key_id = config
            .access_key_id
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("R2_ACCESS_KEY_ID".into()))?;
        let secret_access_key = config
            .secret_access_key
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("R2_SECRET_ACCESS_KEY".into()))?;

        let operator = |bucket: &str| -> Result<Operator, StorageError> {
            let builder = services::S3::default()
                .endpoint(&endpoint)
                .bucket(bucket)
                .region(&config.region)
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key)
                .disable_config_load()
                .disable_ec2_metadata();
            Ok(Operator::new(builder)?
                .layer(RetryLayer::new().with_max_times(RETRY_TIMES))
                .finish())
        };

        Ok(Self {
            original: operator(&config.bucket_original)?,
            blurred: operator(&config.bucket_blurred)?,
        })
    }

    fn operator(&self, bucket: Bucket) -> &Operator {
        match bucket {
            Bucket::Original => &self.original,
            Bucket::Blurred => &self.blurred,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = body.len();
        self.operator(bucket)
            .write_with(key, body)
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .await?;
        debug!(key, size, "object uploaded");
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        match self.operator(bucket).delete(key).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> StorageConfig {
        StorageConfig {
            backend: "s3".into(),
            endpoint: Some(endpoint.into()),
            region: "auto".into(),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into()),
            bucket_original: "shots".into(),
            bucket_blurred: "shots-blurred".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn put_targets_bucket_path_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/shots-blurred/users/u/1-a_blurred.jpg"))
            .and(header("content-type", "image/jpeg"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = S3Storage::from_config(&config(&server.uri())).unwrap();
        storage
            .put(
                Bucket::Blurred,
                "users/u/1-a_blurred.jpg",
                b"jpeg-bytes".to_vec(),
                "image/jpeg",
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let put = requests
            .iter()
            .find(|r| r.method.as_str() == "PUT")
            .expect("put request");
        let cache_control = put
            .headers
            .get("cache-control")
            .and_then(|v| v.to_str().ok());
        assert_eq!(cache_control, Some(CACHE_CONTROL));
        assert_eq!(put.body, b"jpeg-bytes".to_vec());
    }

    #[tokio::test]
    async fn put_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>denied</Message></Error>",
            ))
            .mount(&server)
            .await;

        let storage = S3Storage::from_config(&config(&server.uri())).unwrap();
        let err = storage
            .put(Bucket::Original, "k.jpg", vec![1], "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)), "{err}");
    }

    #[tokio::test]
    async fn delete_of_missing_object_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/shots/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let storage = S3Storage::from_config(&config(&server.uri())).unwrap();
        storage.delete(Bucket::Original, "gone.jpg").await.unwrap();
    }

    #[test]
    fn missing_credentials_are_not_configured() {
        let mut cfg = config("https://acct.r2.cloudflarestorage.com");
        cfg.secret_access_key = None;
        let err = S3Storage::from_config(&cfg).unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured(ref v) if v == "R2_SECRET_ACCESS_KEY"));

        let mut cfg = config("not a url");
        cfg.account_id = None;
        let err = S3Storage::from_config(&cfg).unwrap_err();
        assert!(matches!(err, StorageError::InvalidEndpoint(_)));
    }
}
