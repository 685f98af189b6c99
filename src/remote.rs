use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{Collection, RoleInfo};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Backend collection API. Every call is a single attempt; failures are
/// reported as `None`/`false` and never raised.
#[async_trait]
pub trait RemoteCollections: Send + Sync + 'static {
    async fn fetch(&self, collection: Collection, token: &str) -> Option<Vec<Value>>;

    /// Batch upsert.
    async fn save(&self, collection: Collection, records: Vec<Value>, token: &str) -> bool;

    async fn delete_one(&self, collection: Collection, id: &str, token: &str) -> bool;

    async fn fetch_role(&self, token: &str) -> Option<RoleInfo>;
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{collection} API returned HTTP {status}: {body}")]
    Status {
        collection: String,
        status: StatusCode,
        body: String,
    },

    #[error("{0} API returned an unexpected body")]
    Shape(String),
}

pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/api/{}", self.base_url, collection.resource())
    }

    async fn check(collection: &str, response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            collection: collection.to_string(),
            status,
            body,
        })
    }

    pub async fn try_fetch(&self, collection: Collection, token: &str) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .bearer_auth(token)
            .send()
            .await?;
        let response = Self::check(collection.resource(), response).await?;
        let body: Value = response.json().await?;
        unwrap_collection(collection, body)
    }

    pub async fn try_save(
        &self,
        collection: Collection,
        records: Vec<Value>,
        token: &str,
    ) -> Result<(), RemoteError> {
        let mut payload = Map::new();
        payload.insert(collection.body_field().to_string(), Value::Array(records));
        let response = self
            .client
            .post(self.collection_url(collection))
            .bearer_auth(token)
            .json(&Value::Object(payload))
            .send()
            .await?;
        Self::check(collection.resource(), response).await?;
        Ok(())
    }

    pub async fn try_delete(&self, collection: Collection, id: &str, token: &str) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.collection_url(collection), id);
        let response = self.client.delete(url).bearer_auth(token).send().await?;
        Self::check(collection.resource(), response).await?;
        Ok(())
    }

    pub async fn try_fetch_role(&self, token: &str) -> Result<RoleInfo, RemoteError> {
        let response = self
            .client
            .get(format!("{}/api/role", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        let response = Self::check("role", response).await?;
        Ok(response.json().await?)
    }
}

/// Accepts either a bare array or `{ "<field>": [...] }`.
fn unwrap_collection(collection: Collection, body: Value) -> Result<Vec<Value>, RemoteError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove(collection.body_field()) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(RemoteError::Shape(collection.resource().to_string())),
        },
        _ => Err(RemoteError::Shape(collection.resource().to_string())),
    }
}

#[async_trait]
impl RemoteCollections for HttpRemote {
    async fn fetch(&self, collection: Collection, token: &str) -> Option<Vec<Value>> {
        match self.try_fetch(collection, token).await {
            Ok(records) => {
                debug!(%collection, count = records.len(), "fetched remote collection");
                Some(records)
            }
            Err(err) => {
                warn!(%collection, error = %err, "remote fetch failed");
                None
            }
        }
    }

    async fn save(&self, collection: Collection, records: Vec<Value>, token: &str) -> bool {
        let count = records.len();
        match self.try_save(collection, records, token).await {
            Ok(()) => {
                debug!(%collection, count, "saved records remotely");
                true
            }
            Err(err) => {
                warn!(%collection, count, error = %err, "remote save failed");
                false
            }
        }
    }

    async fn delete_one(&self, collection: Collection, id: &str, token: &str) -> bool {
        match self.try_delete(collection, id, token).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%collection, %id, error = %err, "remote delete failed");
                false
            }
        }
    }

    async fn fetch_role(&self, token: &str) -> Option<RoleInfo> {
        match self.try_fetch_role(token).await {
            Ok(role) => Some(role),
            Err(err) => {
                warn!(error = %err, "role lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unwraps_bare_and_wrapped_bodies() {
        let bare = unwrap_collection(Collection::Assets, json!([{ "id": "a" }])).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped =
            unwrap_collection(Collection::TextItems, json!({ "items": [{ "id": "t" }, { "id": "u" }] }))
                .unwrap();
        assert_eq!(wrapped.len(), 2);

        assert!(unwrap_collection(Collection::TextItems, json!({ "assets": [] })).is_err());
        assert!(unwrap_collection(Collection::Events, json!("nope")).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let remote = HttpRemote::with_client(Client::new(), "http://localhost:3000/");
        assert_eq!(remote.base_url(), "http://localhost:3000");
        assert_eq!(
            remote.collection_url(Collection::TextSections),
            "http://localhost:3000/api/text-sections"
        );
    }

    #[test]
    fn status_error_mentions_collection() {
        let err = RemoteError::Status {
            collection: "assets".into(),
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        };
        assert_eq!(
            err.to_string(),
            "assets API returned HTTP 502 Bad Gateway: upstream down"
        );
    }
}
