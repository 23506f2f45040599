use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: Option<String>)
        -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Address under which clients can fetch `key`.
    fn object_url(&self, key: &str) -> String;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_url: Option<String>,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>, public_url: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_url,
        }
    }
}

/// Joins `key` onto `base` with exactly one slash between them.
pub fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .with_context(|| format!("failed to upload {key} to S3"))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to download {key} from S3"))?;

        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read object stream")?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to delete {key} from S3"))?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => join_url(base, key),
            None => format!("s3://{}/{}", self.bucket, key.trim_start_matches('/')),
        }
    }
}
