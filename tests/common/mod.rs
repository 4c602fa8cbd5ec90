#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use metastore_api::app::{app, AppState};
use metastore_api::config::AppConfig;
use metastore_api::permissions::{Action, Caller, DummyPermissionGate, PermissionGate};
use metastore_api::services::{MetaError, ServiceContext};
use metastore_api::store::{DocumentStore, MemoryStore};

/// The router over a fresh in-memory store, driven without a socket.
pub struct TestApp {
    router: Router,
    pub store: Arc<dyn DocumentStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gate(Arc::new(DummyPermissionGate))
    }

    pub fn with_gate(gate: Arc<dyn PermissionGate>) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let config = AppConfig::default();
        let services = ServiceContext::new(store.clone(), gate, config.listing.clone());
        Self { router: app(AppState::new(services, config)), store }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request_as(method, uri, body, None).await
    }

    pub async fn request_as(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        self.send(method, uri, body.map(|b| b.to_string()), authorization).await
    }

    /// Sends `body` verbatim as JSON content.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<String>,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = authorization {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Creates a database and asserts success.
    pub async fn database(&self, database_id: &str, extra: Value) -> Value {
        let mut body = json!({ "database_id": database_id });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        let (status, created) = self.post("/databases", body).await;
        assert_eq!(status, StatusCode::OK, "create database {}: {}", database_id, created);
        created
    }
}

pub fn assert_error(status: StatusCode, body: &Value, expected: StatusCode) {
    assert_eq!(status, expected, "unexpected response body {}", body);
    assert_eq!(body["error"], json!(true), "not an error body: {}", body);
    assert!(body["code"].is_string());
    assert!(body["detail"].is_string());
}

/// Permission gate answering from a fixed table, keyed by the raw
/// `Authorization` header of the caller.
#[derive(Default)]
pub struct TableGate {
    permitted: HashMap<(String, String), HashSet<Action>>,
    hidden: HashMap<String, Vec<String>>,
    broken: bool,
}

impl TableGate {
    pub fn broken() -> Self {
        Self { broken: true, ..Default::default() }
    }

    pub fn allow(mut self, token: &str, database_id: &str, actions: &[Action]) -> Self {
        self.permitted
            .entry((token.to_string(), database_id.to_string()))
            .or_default()
            .extend(actions.iter().copied());
        self
    }

    pub fn hide(mut self, database_id: &str, columns: &[&str]) -> Self {
        self.hidden
            .insert(database_id.to_string(), columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

#[async_trait]
impl PermissionGate for TableGate {
    async fn is_permitted(&self, caller: &Caller, action: Action, database_id: &str) -> bool {
        let token = caller.authorization.clone().unwrap_or_default();
        !self.broken
            && self
                .permitted
                .get(&(token, database_id.to_string()))
                .map_or(false, |actions| actions.contains(&action))
    }

    async fn columns_to_filter(&self, _caller: &Caller, database_id: &str) -> Result<Vec<String>, MetaError> {
        if self.broken {
            return Err(MetaError::PermissionDenied("permission manager unreachable".to_string()));
        }
        Ok(self.hidden.get(database_id).cloned().unwrap_or_default())
    }
}

/// The server binary listening on a real port, for smoke tests.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_metastore-api"))
            .env("APP_ENV", "development")
            .env("API_HOST", "127.0.0.1")
            .env("API_PORT", port.to_string())
            .env("METASTORE_BACKEND", "memory")
            .env("API_IGNORE_PERMISSION_CHECK", "true")
            .env_remove("METASTORE_CONFIG")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/healthz", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
