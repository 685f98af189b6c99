use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub upload_url: String,
    pub public_url: String,
}

/// Object store reached through a presign endpoint: the backend hands out a
/// one-shot upload URL plus the public URL the object will be served from.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn presign_upload(
        &self,
        file_name: &str,
        content_type: &str,
        event_id: &str,
        token: &str,
    ) -> Result<PresignedUpload>;

    async fn put_object(&self, upload_url: &str, bytes: Bytes, content_type: &str) -> Result<()>;

    async fn delete_object(&self, public_url: &str, token: &str) -> Result<()>;
}

pub struct HttpObjectStorage {
    client: Client,
    presign_url: String,
}

impl HttpObjectStorage {
    pub fn new(presign_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build object storage HTTP client")?;
        Ok(Self {
            client,
            presign_url: presign_url.into(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignRequest<'a> {
    file_name: &'a str,
    file_type: &'a str,
    event_id: &'a str,
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn presign_upload(
        &self,
        file_name: &str,
        content_type: &str,
        event_id: &str,
        token: &str,
    ) -> Result<PresignedUpload> {
        let response = self
            .client
            .post(&self.presign_url)
            .bearer_auth(token)
            .json(&PresignRequest {
                file_name,
                file_type: content_type,
                event_id,
            })
            .send()
            .await
            .context("failed to request presigned upload URL")?;

        if !response.status().is_success() {
            bail!("presign request failed with status {}", response.status());
        }

        response
            .json()
            .await
            .context("presign response was not valid JSON")
    }

    async fn put_object(&self, upload_url: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("failed to upload object")?;

        if !response.status().is_success() {
            bail!("object upload failed with status {}", response.status());
        }
        Ok(())
    }

    async fn delete_object(&self, public_url: &str, token: &str) -> Result<()> {
        let response = self
            .client
            .delete(&self.presign_url)
            .bearer_auth(token)
            .query(&[("url", public_url)])
            .send()
            .await
            .context("failed to delete object")?;

        if !response.status().is_success() {
            bail!("object delete failed with status {}", response.status());
        }
        Ok(())
    }
}

/// Storage for sessions without a presign endpoint: every call fails, so
/// uploads fall back to inline media.
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn presign_upload(&self, _: &str, _: &str, _: &str, _: &str) -> Result<PresignedUpload> {
        bail!("object storage is not configured")
    }

    async fn put_object(&self, _: &str, _: Bytes, _: &str) -> Result<()> {
        bail!("object storage is not configured")
    }

    async fn delete_object(&self, _: &str, _: &str) -> Result<()> {
        bail!("object storage is not configured")
    }
}
