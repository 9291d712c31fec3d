/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

pub mod matcher;
pub mod state;

use crate::spec::{HttpMethod, UnsupportedMethod};
use crate::storage::materializer::{status_code_of, HeaderEntry, MockResponseFile};
use crate::storage::{layout, EndpointStatus, FileMaterializer, MockStore, StorageError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use matcher::EndpointMatcher;
use serde::Serialize;
use serde_json::{json, Value};
use state::{RequestEvent, RequestStats};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// Live registration of one endpoint directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEndpoint {
    pub path: String,
    pub method: HttpMethod,
    pub directory: PathBuf,
}

impl RuntimeEndpoint {
    fn key(&self) -> String {
        self.directory.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Stopped,
    Starting,
    Running,
    Error(String),
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterState::Stopped => f.write_str("stopped"),
            RouterState::Starting => f.write_str("starting"),
            RouterState::Running => f.write_str("running"),
            RouterState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no mock endpoint for {method} {path}")]
    NotFound { method: String, path: String },
    #[error("router is not running (state: {state})")]
    NotRunning { state: String },
    #[error("response file '{file}' does not exist for this endpoint")]
    UnknownResponseFile { file: String },
    #[error("endpoint directory {} has no response files", .directory.display())]
    MissingResponse { directory: PathBuf },
    #[error(transparent)]
    InvalidMethod(#[from] UnsupportedMethod),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RouterError {
    /// Short label used as the `error.type` attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::NotFound { .. } => "not_found",
            RouterError::NotRunning { .. } => "not_running",
            RouterError::UnknownResponseFile { .. } => "unknown_response_file",
            RouterError::MissingResponse { .. } => "missing_response",
            RouterError::InvalidMethod(_) => "invalid_method",
            RouterError::Storage(_) => "storage",
        }
    }
}

impl ResponseError for RouterError {
    fn status_code(&self) -> StatusCode {
        match self {
            RouterError::NotFound { .. } => StatusCode::NOT_FOUND,
            RouterError::NotRunning { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RouterError::UnknownResponseFile { .. } | RouterError::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            RouterError::MissingResponse { .. } | RouterError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            RouterError::MissingResponse { .. } | RouterError::Storage(_) => json!({
                "error": "Failed to serve mock response",
                "detail": self.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterResponse {
    /// Template of the endpoint that answered, e.g. `/pets/{petId}`.
    pub route: String,
    pub status: u16,
    pub headers: Vec<HeaderEntry>,
    pub body: Value,
    pub selected_file: String,
    pub path_params: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointView {
    #[schema(example = "/pets/{petId}")]
    pub path: String,
    #[schema(example = "GET")]
    pub method: String,
    pub mock_directory: String,
    pub request_count: u64,
    pub files: Vec<String>,
    pub status: Option<EndpointStatus>,
}

/// Answers live requests from the mock tree.
///
/// The status descriptor is read on every request so that a selection change
/// made by another process shows up immediately. When it is missing or
/// unreadable mid-write, the last status read successfully is used instead.
pub struct RuntimeRouter {
    materializer: FileMaterializer,
    table: ArcSwap<EndpointMatcher>,
    state: RwLock<RouterState>,
    last_good: DashMap<PathBuf, EndpointStatus>,
    stats: RequestStats,
}

impl RuntimeRouter {
    pub fn new(store: MockStore, max_events: usize) -> Self {
        Self {
            materializer: FileMaterializer::new(store),
            table: ArcSwap::from_pointee(EndpointMatcher::default()),
            state: RwLock::new(RouterState::Stopped),
            last_good: DashMap::new(),
            stats: RequestStats::with_capacity(max_events),
        }
    }

    pub fn store(&self) -> &MockStore {
        self.materializer.store()
    }

    pub fn state(&self) -> RouterState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_state(&self, next: RouterState) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(from = %*state, to = %next, "Router state change");
        *state = next;
    }

    pub async fn start(&self) -> Result<(), RouterError> {
        self.set_state(RouterState::Starting);
        match self.rehydrate().await {
            Ok(count) => {
                info!(endpoints = count, root = %self.store().root().display(), "Router running");
                self.set_state(RouterState::Running);
                Ok(())
            }
            Err(e) => {
                self.set_state(RouterState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn stop(&self) {
        self.set_state(RouterState::Stopped);
        info!("Router stopped");
    }

    /// Rebuilds the endpoint table from storage. Endpoints already registered
    /// keep the path spelling they were registered with.
    pub async fn rehydrate(&self) -> Result<usize, RouterError> {
        let scanned = self.store().scan_endpoints().await?;
        let current = self.table.load();
        let known: HashMap<&Path, &Arc<RuntimeEndpoint>> = current
            .endpoints()
            .map(|e| (e.directory.as_path(), e))
            .collect();

        let endpoints: Vec<Arc<RuntimeEndpoint>> = scanned
            .into_iter()
            .map(|(path, method, directory)| match known.get(directory.as_path()) {
                Some(existing) => Arc::clone(existing),
                None => Arc::new(RuntimeEndpoint {
                    path,
                    method,
                    directory,
                }),
            })
            .collect();

        let count = endpoints.len();
        self.table.store(Arc::new(EndpointMatcher::new(endpoints)));
        debug!(endpoints = count, "Endpoint table rebuilt from storage");
        Ok(count)
    }

    pub fn register(&self, endpoint: RuntimeEndpoint) {
        let endpoint = Arc::new(endpoint);
        self.table.rcu(|current| {
            let mut endpoints: Vec<Arc<RuntimeEndpoint>> = current
                .endpoints()
                .filter(|e| e.directory != endpoint.directory)
                .cloned()
                .collect();
            endpoints.push(endpoint.clone());
            EndpointMatcher::new(endpoints)
        });
        info!(method = %endpoint.method, path = %endpoint.path, "Endpoint registered");
    }

    /// The registered endpoint owning `directory`, if any.
    pub fn registered_at(&self, directory: &Path) -> Option<Arc<RuntimeEndpoint>> {
        self.table
            .load()
            .endpoints()
            .find(|e| e.directory == directory)
            .cloned()
    }

    pub fn lookup(&self, path: &str, method: HttpMethod) -> Option<Arc<RuntimeEndpoint>> {
        let directory = layout::map_to_directory(self.store().root(), path, method).ok()?;
        self.registered_at(&directory)
    }

    pub fn endpoint_count(&self) -> usize {
        self.table.load().len()
    }

    pub fn request_count(&self, endpoint: &RuntimeEndpoint) -> u64 {
        self.stats.get_count(&endpoint.key())
    }

    pub fn recent_requests(&self) -> Vec<RequestEvent> {
        self.stats.recent()
    }

    pub async fn handle(&self, method: &str, request_path: &str) -> Result<RouterResponse, RouterError> {
        let state = self.state();
        if state != RouterState::Running {
            return Err(RouterError::NotRunning {
                state: state.to_string(),
            });
        }

        let started = Instant::now();
        let not_found = || RouterError::NotFound {
            method: method.to_string(),
            path: request_path.to_string(),
        };

        let matched = HttpMethod::from_wire(method).and_then(|m| self.table.load().find_match(m, request_path));
        let Some((endpoint, path_params)) = matched else {
            self.record(method, request_path, 404, started, None);
            return Err(not_found());
        };

        self.stats.increment_count(&endpoint.key());
        let (status, file) = match self.load_selected(&endpoint).await {
            Ok(loaded) => loaded,
            Err(e) => {
                let code = e.status_code().as_u16();
                self.record(method, request_path, code, started, Some(endpoint.as_ref()));
                return Err(e);
            }
        };
        let code = status_code_of(&status.selected_file).unwrap_or(500);
        self.record(method, request_path, code, started, Some(endpoint.as_ref()));

        Ok(RouterResponse {
            route: endpoint.path.clone(),
            status: code,
            headers: file.header,
            body: file.body,
            selected_file: status.selected_file,
            path_params,
        })
    }

    /// Current status (after its delay) and the response file it selects.
    async fn load_selected(
        &self,
        endpoint: &RuntimeEndpoint,
    ) -> Result<(EndpointStatus, MockResponseFile), RouterError> {
        let status = self.current_status(endpoint).await?;
        if status.delay_millisecond > 0 {
            debug!(delay_ms = status.delay_millisecond, "Delaying mock response");
            tokio::time::sleep(Duration::from_millis(status.delay_millisecond)).await;
        }

        let file = self
            .materializer
            .read_response(&endpoint.directory, &status.selected_file)
            .await?;
        Ok((status, file))
    }

    fn record(&self, method: &str, path: &str, status: u16, started: Instant, endpoint: Option<&RuntimeEndpoint>) {
        self.stats.record(RequestEvent {
            method: method.to_string(),
            path: path.to_string(),
            status,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            endpoint: endpoint.map(RuntimeEndpoint::key),
        });
    }

    async fn current_status(&self, endpoint: &RuntimeEndpoint) -> Result<EndpointStatus, RouterError> {
        match self.materializer.read_status(&endpoint.directory).await {
            Ok(status) => {
                self.last_good.insert(endpoint.directory.clone(), status.clone());
                Ok(status)
            }
            Err(e) if e.is_not_found() || matches!(e, StorageError::Decode { .. }) => {
                if let Some(previous) = self.last_good.get(&endpoint.directory) {
                    debug!(error = %e, "Using last known status");
                    return Ok(previous.clone());
                }
                self.default_status(&endpoint.directory).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// First 2xx response file, else the first file; no delay.
    async fn default_status(&self, directory: &Path) -> Result<EndpointStatus, RouterError> {
        let files = self.store().list_response_files(directory).await?;
        let selected = files
            .iter()
            .find(|f| matches!(status_code_of(f), Some(200..=299)))
            .or_else(|| files.first())
            .cloned()
            .ok_or_else(|| RouterError::MissingResponse {
                directory: directory.to_path_buf(),
            })?;
        Ok(EndpointStatus::new(selected))
    }

    /// Changes the active response file and delay of a registered endpoint.
    pub async fn select_response(
        &self,
        path: &str,
        method: HttpMethod,
        selected_file: &str,
        delay_millisecond: u64,
    ) -> Result<EndpointStatus, RouterError> {
        let endpoint = self.lookup(path, method).ok_or_else(|| RouterError::NotFound {
            method: method.to_string(),
            path: path.to_string(),
        })?;

        let files = self.store().list_response_files(&endpoint.directory).await?;
        if !files.iter().any(|f| f == selected_file) {
            return Err(RouterError::UnknownResponseFile {
                file: selected_file.to_string(),
            });
        }

        let status = EndpointStatus {
            selected_file: selected_file.to_string(),
            delay_millisecond,
        };
        self.materializer.write_status(&endpoint.directory, &status).await?;
        self.last_good.insert(endpoint.directory.clone(), status.clone());
        info!(
            method = %method,
            path = %path,
            selected = %selected_file,
            delay_ms = delay_millisecond,
            "Endpoint status updated"
        );
        Ok(status)
    }

    pub async fn describe(&self) -> Vec<EndpointView> {
        let table = self.table.load_full();
        let mut views = Vec::with_capacity(table.len());
        for endpoint in table.endpoints() {
            let files = match self.store().list_response_files(&endpoint.directory).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(directory = %endpoint.directory.display(), error = %e, "Cannot list endpoint files");
                    Vec::new()
                }
            };
            views.push(EndpointView {
                path: endpoint.path.clone(),
                method: endpoint.method.to_string(),
                mock_directory: endpoint.key(),
                request_count: self.request_count(endpoint),
                files,
                status: self.materializer.read_status(&endpoint.directory).await.ok(),
            });
        }
        views.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn write_endpoint(store: &MockStore, path: &str, method: HttpMethod, files: &[(&str, Value)]) -> PathBuf {
        let dir = layout::map_to_directory(store.root(), path, method).unwrap();
        for (name, body) in files {
            store
                .write_json(
                    &dir.join(name),
                    &MockResponseFile {
                        header: vec![],
                        body: body.clone(),
                    },
                )
                .await
                .unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_not_running_rejects() {
        let tmp = tempfile::tempdir().unwrap();
        let router = RuntimeRouter::new(MockStore::new(tmp.path()), 10);
        let err = router.handle("GET", "/x").await.unwrap_err();
        assert!(matches!(err, RouterError::NotRunning { .. }));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let router = RuntimeRouter::new(MockStore::new(tmp.path()), 10);
        assert_eq!(router.state(), RouterState::Stopped);
        router.start().await.unwrap();
        assert_eq!(router.state(), RouterState::Running);
        router.stop();
        assert_eq!(router.state(), RouterState::Stopped);
    }

    #[tokio::test]
    async fn test_rehydrate_and_serve_default_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        write_endpoint(
            &store,
            "/pets/{petId}",
            HttpMethod::Get,
            &[
                ("not-found-404.json", json!({"error": "nope"})),
                ("ok-200.json", json!({"id": 1})),
            ],
        )
        .await;

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();
        assert_eq!(router.endpoint_count(), 1);

        let response = router.handle("GET", "/pets/7").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"id": 1}));
        assert_eq!(response.selected_file, "ok-200.json");
        assert_eq!(response.path_params.get("petId"), Some(&"7".to_string()));

        let err = router.handle("POST", "/pets/7").await.unwrap_err();
        assert!(matches!(err, RouterError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_request_method_must_match_exactly() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        write_endpoint(&store, "/pets", HttpMethod::Get, &[("ok-200.json", json!([]))]).await;

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();
        assert!(router.handle("GET", "/pets").await.is_ok());
        for method in ["get", " GET ", "Get"] {
            let err = router.handle(method, "/pets").await.unwrap_err();
            assert!(matches!(err, RouterError::NotFound { .. }), "{method:?}");
        }
    }

    #[tokio::test]
    async fn test_failed_read_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        let dir = write_endpoint(&store, "/orders", HttpMethod::Get, &[("ok-200.json", json!([]))]).await;
        store
            .write_json(&dir.join("status.json"), &EndpointStatus::new("gone-200.json"))
            .await
            .unwrap();

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();
        let err = router.handle("GET", "/orders").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let events = router.recent_requests();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, 500);
        assert_eq!(events[0].endpoint.as_deref(), Some(dir.to_string_lossy().as_ref()));
        let endpoint = router.lookup("/orders", HttpMethod::Get).unwrap();
        assert_eq!(router.request_count(&endpoint), 1);
    }

    #[tokio::test]
    async fn test_status_reread_each_request() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        let dir = write_endpoint(
            &store,
            "/users",
            HttpMethod::Get,
            &[("ok-200.json", json!([])), ("boom-500.json", json!({"error": "x"}))],
        )
        .await;

        let router = RuntimeRouter::new(store.clone(), 10);
        router.start().await.unwrap();
        assert_eq!(router.handle("GET", "/users").await.unwrap().status, 200);

        store
            .write_json(&dir.join("status.json"), &EndpointStatus::new("boom-500.json"))
            .await
            .unwrap();
        let response = router.handle("GET", "/users").await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "x"}));
    }

    #[tokio::test]
    async fn test_partial_status_uses_last_known_good() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        let dir = write_endpoint(
            &store,
            "/users",
            HttpMethod::Get,
            &[("ok-200.json", json!([])), ("boom-500.json", json!({}))],
        )
        .await;
        store
            .write_json(&dir.join("status.json"), &EndpointStatus::new("boom-500.json"))
            .await
            .unwrap();

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();
        assert_eq!(router.handle("GET", "/users").await.unwrap().status, 500);

        std::fs::write(dir.join("status.json"), "{\"selec").unwrap();
        assert_eq!(router.handle("GET", "/users").await.unwrap().status, 500);
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        let dir = write_endpoint(&store, "/slow", HttpMethod::Get, &[("success-200.json", json!({"ok": true}))]).await;
        store
            .write_json(
                &dir.join("status.json"),
                &EndpointStatus {
                    selected_file: "success-200.json".to_string(),
                    delay_millisecond: 50,
                },
            )
            .await
            .unwrap();

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();

        let started = Instant::now();
        let response = router.handle("GET", "/slow").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_counts_and_events() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        write_endpoint(&store, "/a", HttpMethod::Get, &[("ok-200.json", json!(1))]).await;

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();
        router.handle("GET", "/a").await.unwrap();
        router.handle("GET", "/a/").await.unwrap();
        let _ = router.handle("GET", "/missing").await;

        let endpoint = router.lookup("/a", HttpMethod::Get).unwrap();
        assert_eq!(router.request_count(&endpoint), 2);

        let statuses: Vec<_> = router.recent_requests().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![200, 200, 404]);
    }

    #[tokio::test]
    async fn test_select_response() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        write_endpoint(
            &store,
            "/a",
            HttpMethod::Get,
            &[("ok-200.json", json!(1)), ("gone-410.json", json!(2))],
        )
        .await;

        let router = RuntimeRouter::new(store, 10);
        router.start().await.unwrap();

        let status = router
            .select_response("/a", HttpMethod::Get, "gone-410.json", 0)
            .await
            .unwrap();
        assert_eq!(status.selected_file, "gone-410.json");
        assert_eq!(router.handle("GET", "/a").await.unwrap().status, 410);

        let err = router
            .select_response("/a", HttpMethod::Get, "nope-200.json", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::UnknownResponseFile { .. }));

        let err = router
            .select_response("/b", HttpMethod::Get, "ok-200.json", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_keeps_original_spelling_across_rehydrate() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MockStore::new(tmp.path());
        let dir = write_endpoint(&store, "/Users", HttpMethod::Get, &[("ok-200.json", json!(1))]).await;

        let router = RuntimeRouter::new(store, 10);
        router.register(RuntimeEndpoint {
            path: "/Users".to_string(),
            method: HttpMethod::Get,
            directory: dir.clone(),
        });
        router.start().await.unwrap();

        assert_eq!(router.endpoint_count(), 1);
        assert_eq!(router.registered_at(&dir).unwrap().path, "/Users");
    }
}
