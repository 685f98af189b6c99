use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use reviewdesk::auth::jwt::JwtService;
use reviewdesk::cache::{LocalCache, MemoryCacheStore};
use reviewdesk::config::AppConfig;
use reviewdesk::identity::{LocalIdentity, Session};
use reviewdesk::models::{Collection, Role, RoleInfo};
use reviewdesk::notify::{NotificationSettings, Notifier, NotifyError};
use reviewdesk::pipeline::{Dashboard, Services};
use reviewdesk::remote::RemoteCollections;
use reviewdesk::routes;
use reviewdesk::state::AppState;
use reviewdesk::storage::{DisabledStorage, ObjectStorage, PresignedUpload};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tower::make::Shared;
use tower::util::ServiceExt;

pub const TEST_EMAIL: &str = "jane.doe@example.com";
pub const TEST_ACTOR: &str = "Jane Doe";

pub fn test_config(api_base_url: &str, reviewer_emails: Vec<String>) -> AppConfig {
    AppConfig {
        api_base_url: api_base_url.to_string(),
        request_timeout_secs: 5,
        cache_dir: PathBuf::from("target/test-cache"),
        presign_url: None,
        demo_mode: false,
        demo_role: Role::Reviewer,
        user_email: None,
        user_password: None,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        jwt_secret: Some("test-secret".to_string()),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        reviewer_emails,
        notifications: NotificationSettings::default(),
    }
}

/// Router driven in-process with `oneshot`.
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new(reviewer_emails: Vec<String>) -> Result<Self> {
        let config = test_config("http://devserver.test", reviewer_emails);
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(config, jwt);
        let router = routes::create_router(state.clone());
        Ok(Self { state, router })
    }

    pub fn token(&self, email: &str, role: Role) -> Result<String> {
        self.state
            .jwt
            .generate_token(&format!("user:{email}"), Some(email), role)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, token).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::POST, path, Some(body), token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, token).await
    }
}

/// Dev backend served on an ephemeral port, for the reqwest clients.
#[allow(dead_code)]
pub struct LiveServer {
    pub base_url: String,
    pub state: AppState,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl LiveServer {
    pub async fn start(reviewer_emails: Vec<String>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let config = test_config(&base_url, reviewer_emails);
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(config, jwt);
        let router = routes::create_router(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, Shared::new(router)).await;
        });
        Ok(Self {
            base_url,
            state,
            handle,
        })
    }

    pub fn presign_url(&self) -> String {
        format!("{}/api/uploads/presign", self.base_url)
    }

    /// Identity whose sign-ins mint tokens this server accepts.
    pub fn identity(&self) -> LocalIdentity {
        LocalIdentity::signed_out(
            self.state.jwt.clone(),
            Role::Creator,
            self.state.config.reviewer_emails.clone(),
        )
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// In-memory backend double that records every call in order.
#[derive(Default)]
pub struct FakeRemote {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
    failing: Mutex<HashSet<Collection>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl FakeRemote {
    /// Fetches wait for a permit on `gate` before answering.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub async fn set(&self, collection: Collection, records: Vec<Value>) {
        self.collections.lock().await.insert(collection, records);
    }

    pub async fn fail(&self, collection: Collection) {
        self.failing.lock().await.insert(collection);
    }

    pub async fn recover(&self, collection: Collection) {
        self.failing.lock().await.remove(&collection);
    }

    pub async fn records(&self, collection: Collection) -> Vec<Value> {
        self.collections
            .lock()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Calls other than fetches, in order.
    pub async fn writes(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| !call.starts_with("fetch"))
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn log(&self, call: String) {
        self.calls.lock().await.push(call);
    }

    async fn is_failing(&self, collection: Collection) -> bool {
        self.failing.lock().await.contains(&collection)
    }
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RemoteCollections for FakeRemote {
    async fn fetch(&self, collection: Collection, _token: &str) -> Option<Vec<Value>> {
        self.log(format!("fetch {collection}")).await;
        if let Some(gate) = &self.gate {
            gate.acquire().await.ok()?.forget();
        }
        if self.is_failing(collection).await {
            return None;
        }
        Some(self.records(collection).await)
    }

    async fn save(&self, collection: Collection, records: Vec<Value>, _token: &str) -> bool {
        self.log(format!("save {collection}")).await;
        if self.is_failing(collection).await {
            return false;
        }
        let mut collections = self.collections.lock().await;
        let rows = collections.entry(collection).or_default();
        for record in records {
            match rows.iter_mut().find(|row| record_id(row) == record_id(&record)) {
                Some(existing) => *existing = record,
                None => rows.insert(0, record),
            }
        }
        true
    }

    async fn delete_one(&self, collection: Collection, id: &str, _token: &str) -> bool {
        self.log(format!("delete {collection}/{id}")).await;
        if self.is_failing(collection).await {
            return false;
        }
        let mut collections = self.collections.lock().await;
        if let Some(rows) = collections.get_mut(&collection) {
            rows.retain(|row| record_id(row) != Some(id));
        }
        true
    }

    async fn fetch_role(&self, _token: &str) -> Option<RoleInfo> {
        None
    }
}

/// Object storage whose presign step can be held open.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl FakeStorage {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn presign_upload(
        &self,
        file_name: &str,
        _content_type: &str,
        event_id: &str,
        _token: &str,
    ) -> Result<PresignedUpload> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|err| anyhow!("gate closed: {err}"))?
                .forget();
        }
        let url = format!("https://objects.test/{event_id}/{file_name}");
        Ok(PresignedUpload {
            upload_url: url.clone(),
            public_url: url,
        })
    }

    async fn put_object(&self, upload_url: &str, bytes: Bytes, _content_type: &str) -> Result<()> {
        self.objects.lock().await.insert(upload_url.to_string(), bytes);
        Ok(())
    }

    async fn delete_object(&self, public_url: &str, _token: &str) -> Result<()> {
        self.objects
            .lock()
            .await
            .remove(public_url)
            .map(|_| ())
            .ok_or_else(|| anyhow!("object {public_url} missing"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.messages.lock().await.push(message.to_string());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn signed_in_session() -> Session {
    Session {
        user_id: format!("user:{TEST_EMAIL}"),
        email: Some(TEST_EMAIL.to_string()),
        role: Role::Reviewer,
        access_token: Some("test-token".to_string()),
        offline: false,
    }
}

/// Dashboard wired to test doubles; every field can be swapped before
/// `build`.
#[allow(dead_code)]
pub struct Harness {
    pub cache_store: Arc<MemoryCacheStore>,
    pub remote: Arc<FakeRemote>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: NotificationSettings,
    pub session: Option<Session>,
}

#[allow(dead_code)]
impl Harness {
    pub fn demo() -> Self {
        Self::with_session(Some(Session::demo(Role::Reviewer)))
    }

    pub fn signed_in() -> Self {
        Self::with_session(Some(signed_in_session()))
    }

    pub fn with_session(session: Option<Session>) -> Self {
        Self {
            cache_store: Arc::new(MemoryCacheStore::new()),
            remote: Arc::new(FakeRemote::default()),
            storage: Arc::new(DisabledStorage),
            notifier: Arc::new(RecordingNotifier::default()),
            settings: NotificationSettings::default(),
            session,
        }
    }

    pub fn cache(&self) -> LocalCache {
        LocalCache::new(self.cache_store.clone())
    }

    pub fn build(&self) -> Dashboard {
        Dashboard::new(
            Services {
                cache: self.cache(),
                remote: self.remote.clone(),
                identity: Arc::new(LocalIdentity::with_session(None, self.session.clone())),
                storage: self.storage.clone(),
                notifier: self.notifier.clone(),
            },
            self.settings.clone(),
        )
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_json(body: Body) -> Result<Value> {
    Ok(serde_json::from_slice(&body_to_vec(body).await?)?)
}
