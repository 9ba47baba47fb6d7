use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{BlobMeta, BlobStore, StoreError};

/// S3 / MinIO backed blob store scoped to one bucket.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 delete failed: {e}")))?;
        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 upload failed: {e}")))?;

        debug!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Ok(None);
                }
                return Err(StoreError::Backend(format!("S3 download failed: {e}")));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 body read failed: {e}")))?;
        Ok(Some(data.into_bytes()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMeta>, StoreError> {
        let mut metas = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StoreError::Backend(format!("S3 list failed: {e}")))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), 0))
                    .unwrap_or_else(Utc::now);
                metas.push(BlobMeta {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                });
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(metas)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        // S3 DeleteObject succeeds for missing keys, so existence is checked first.
        let exists = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => false,
            Err(e) => return Err(StoreError::Backend(format!("S3 head failed: {e}"))),
        };
        if !exists {
            return Ok(false);
        }
        self.remove(key).await?;
        Ok(true)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let objects = self.list(prefix).await?;
        for object in &objects {
            self.remove(&object.key).await?;
        }
        Ok(objects.len())
    }
}
