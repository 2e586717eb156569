use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::StorageConfig;
use crate::error::AppError;

/// Durable attachment storage. Uploads land in S3 and are served back
/// through the configured public base URL.
pub struct FileStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl FileStorage {
    pub async fn from_config(cfg: &StorageConfig) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&aws_config),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.clone(),
        }
    }

    /// Store one attachment body and return its durable retrieval URL.
    pub async fn store(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put {key}: {e}")))?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}
