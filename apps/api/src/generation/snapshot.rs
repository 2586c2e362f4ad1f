//! Best-effort archival of generated HTML that is not tied to a stored resume
//! (cold-start and image-conversion output).

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&self, key: &str, html: &str) -> Result<()>;
}

pub fn snapshot_key(token: u64) -> String {
    format!("generated/{token}.html")
}

pub struct S3SnapshotSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3SnapshotSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl SnapshotSink for S3SnapshotSink {
    async fn save(&self, key: &str, html: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(html.as_bytes().to_vec()))
            .content_type("text/html; charset=utf-8")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded generated HTML to s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

/// Used when no bucket is configured.
pub struct NoopSnapshotSink;

#[async_trait]
impl SnapshotSink for NoopSnapshotSink {
    async fn save(&self, _key: &str, _html: &str) -> Result<()> {
        Ok(())
    }
}
