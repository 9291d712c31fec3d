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

//! Interactive creation of a single mock endpoint.

use crate::router::{RuntimeEndpoint, RuntimeRouter};
use crate::spec::resolver::TracingSink;
use crate::spec::{HttpMethod, MockSynthesizer, SpecDocument};
use crate::storage::materializer::interactive_responses;
use crate::storage::{layout, EndpointStatus, FileMaterializer, StorageError, SynthesizedResponse};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

pub const MAX_PATH_LEN: usize = 500;

const RESERVED_CHARS: [char; 7] = [':', '|', '<', '>', '"', '*', '?'];

/// Methods accepted by the management API.
pub const CREATABLE_METHODS: [HttpMethod; 5] = [
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Delete,
    HttpMethod::Patch,
];

static ALLOWED_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-/{}]+$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldViolation {
    #[schema(example = "path")]
    pub field: String,
    #[schema(example = "path must not start with the reserved prefix /_mock")]
    pub message: String,
}

impl FieldViolation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExistingEndpoint {
    pub path: String,
    pub method: String,
    pub mock_directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEndpoint {
    #[schema(example = "/pets/{petId}")]
    pub path: String,
    #[schema(example = "GET")]
    pub method: String,
    pub files_created: Vec<String>,
    #[schema(example = "http://localhost:8080/pets/123")]
    pub available_at: String,
    #[schema(example = "mocks/pets/{petId}/GET")]
    pub mock_directory: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("validation failed: {} violation(s)", .0.len())]
    Validation(Vec<FieldViolation>),
    #[error("endpoint {} {} already exists", .0.method, .0.path)]
    Duplicate(ExistingEndpoint),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResponseError for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::Duplicate(_) => StatusCode::CONFLICT,
            RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            RegistryError::Validation(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            RegistryError::Duplicate(existing) => json!({
                "error": "Endpoint already exists",
                "existingEndpoint": existing,
            }),
            RegistryError::Storage(e) => json!({
                "error": "Failed to create endpoint",
                "detail": e.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Checks every rule and reports all violations, not just the first.
pub fn validate(path: &str, method: &str) -> Result<HttpMethod, Vec<FieldViolation>> {
    let mut violations = Vec::new();

    if path.is_empty() {
        violations.push(FieldViolation::new("path", "path is required"));
    } else {
        if path.chars().count() > MAX_PATH_LEN {
            violations.push(FieldViolation::new(
                "path",
                format!("path must be at most {} characters", MAX_PATH_LEN),
            ));
        }
        if !ALLOWED_PATH.is_match(path) {
            violations.push(FieldViolation::new(
                "path",
                "path may only contain letters, digits, hyphens, slashes and braces",
            ));
        }
        let reserved: String = path.chars().filter(|c| RESERVED_CHARS.contains(c)).collect();
        if !reserved.is_empty() {
            violations.push(FieldViolation::new(
                "path",
                format!("path contains reserved characters: {}", reserved),
            ));
        }
        if layout::is_reserved(path) {
            violations.push(FieldViolation::new(
                "path",
                format!("path must not start with the reserved prefix {}", layout::RESERVED_PREFIX),
            ));
        }
    }

    let parsed = method
        .parse::<HttpMethod>()
        .ok()
        .filter(|m| CREATABLE_METHODS.contains(m));
    if parsed.is_none() {
        violations.push(FieldViolation::new(
            "method",
            "method must be one of GET, POST, PUT, DELETE, PATCH",
        ));
    }

    match parsed {
        Some(method) if violations.is_empty() => Ok(method),
        _ => Err(violations),
    }
}

/// Creates one endpoint at a time: validate, claim the directory, write the
/// default response pair plus `status.json`, then register with the router.
pub struct EndpointRegistry {
    router: Arc<RuntimeRouter>,
    materializer: FileMaterializer,
    base_url: String,
    param_placeholder: String,
}

impl EndpointRegistry {
    pub fn new(router: Arc<RuntimeRouter>, base_url: impl Into<String>, param_placeholder: impl Into<String>) -> Self {
        let materializer = FileMaterializer::new(router.store().clone());
        Self {
            router,
            materializer,
            base_url: base_url.into(),
            param_placeholder: param_placeholder.into(),
        }
    }

    pub fn router(&self) -> &Arc<RuntimeRouter> {
        &self.router
    }

    pub async fn create_endpoint(&self, path: &str, method: &str) -> Result<CreatedEndpoint, RegistryError> {
        let method = validate(path, method).map_err(RegistryError::Validation)?;
        let store = self.materializer.store();
        let dir = layout::map_to_directory(store.root(), path, method)
            .map_err(|e| RegistryError::Validation(vec![FieldViolation::new("path", e.to_string())]))?;

        if !store.create_dir_exclusive(&dir).await? {
            return Err(RegistryError::Duplicate(self.existing(&dir, path, method)));
        }

        let files_created = match self.materialize(&dir).await {
            Ok(files) => files,
            Err(e) => {
                if let Err(cleanup) = store.remove_dir_all(&dir).await {
                    warn!(dir = %dir.display(), error = %cleanup, "Rollback of partial endpoint failed");
                }
                return Err(e.into());
            }
        };

        self.router.register(RuntimeEndpoint {
            path: path.to_string(),
            method,
            directory: dir.clone(),
        });

        let created = CreatedEndpoint {
            path: path.to_string(),
            method: method.to_string(),
            files_created,
            available_at: self.available_at(path),
            mock_directory: dir.to_string_lossy().into_owned(),
        };
        info!(
            method = %created.method,
            path = %created.path,
            files = created.files_created.len(),
            "Mock endpoint created"
        );
        Ok(created)
    }

    async fn materialize(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let document = SpecDocument::default();
        let synthesizer = MockSynthesizer::new(&document, &TracingSink);
        let responses: Vec<SynthesizedResponse> = interactive_responses()
            .into_iter()
            .map(|response| SynthesizedResponse {
                body: response
                    .schema
                    .as_ref()
                    .map(|schema| synthesizer.synthesize(schema))
                    .unwrap_or(Value::Null),
                status: response.status,
                description: response.description,
            })
            .collect();

        let files = self.materializer.materialize(dir, &responses).await?;
        if let Some(first) = files.first() {
            self.materializer
                .write_status(dir, &EndpointStatus::new(first.clone()))
                .await?;
        }
        Ok(files)
    }

    fn existing(&self, dir: &Path, requested_path: &str, method: HttpMethod) -> ExistingEndpoint {
        let path = self
            .router
            .registered_at(dir)
            .map(|endpoint| endpoint.path.clone())
            .or_else(|| {
                layout::template_from_directory(self.materializer.store().root(), dir).map(|(path, _)| path)
            })
            .unwrap_or_else(|| requested_path.to_string());

        ExistingEndpoint {
            path,
            method: method.to_string(),
            mock_directory: dir.to_string_lossy().into_owned(),
        }
    }

    /// Example URL for the endpoint with every `{param}` replaced.
    pub fn available_at(&self, path: &str) -> String {
        let concrete: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if layout::is_param_segment(segment) {
                    self.param_placeholder.as_str()
                } else {
                    segment
                }
            })
            .collect();
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), concrete.join("/"));
        url::Url::parse(&raw).map(|u| u.to_string()).unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStore;
    use actix_web::body::to_bytes;

    fn registry(root: &Path) -> EndpointRegistry {
        let router = Arc::new(RuntimeRouter::new(MockStore::new(root), 10));
        EndpointRegistry::new(router, "http://localhost:8080", "123")
    }

    #[test]
    fn test_validate_accepts_good_input() {
        assert_eq!(validate("/pets/{petId}", "get").unwrap(), HttpMethod::Get);
        assert_eq!(validate("/users", "PATCH").unwrap(), HttpMethod::Patch);
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let violations = validate("/_mock/x", "TRACE").unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        // underscore breaks the pattern, the prefix is reserved, the method is unknown
        assert_eq!(fields, vec!["path", "path", "method"]);

        let violations = validate("/a:b?", "GET").unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(violations[1].message.contains(":?"));

        let violations = validate("", "").unwrap_err();
        assert_eq!(violations.len(), 2);

        let long = format!("/{}", "a".repeat(MAX_PATH_LEN));
        assert!(validate(&long, "GET").unwrap_err()[0].message.contains("at most 500"));

        // HEAD is routable but not creatable through the API
        assert!(validate("/x", "HEAD").is_err());
    }

    #[test]
    fn test_available_at_substitutes_params() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path());
        assert_eq!(
            registry.available_at("/pets/{petId}/toys/{toyId}"),
            "http://localhost:8080/pets/123/toys/123"
        );
        assert_eq!(registry.available_at("/"), "http://localhost:8080/");
    }

    #[tokio::test]
    async fn test_create_then_duplicate() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path());

        let created = registry.create_endpoint("/users", "GET").await.unwrap();
        assert_eq!(
            created.files_created,
            vec!["success-200.json".to_string(), "unexpected-error-default.json".to_string()]
        );
        assert_eq!(created.available_at, "http://localhost:8080/users");

        let dir = tmp.path().join("users/GET");
        let status: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("status.json")).unwrap()).unwrap();
        assert_eq!(status, json!({"selected": "success-200.json", "delayMillisecond": 0}));
        let before = std::fs::read_to_string(dir.join("success-200.json")).unwrap();

        let err = registry.create_endpoint("/users", "GET").await.unwrap_err();
        match &err {
            RegistryError::Duplicate(existing) => {
                assert_eq!(existing.path, "/users");
                assert_eq!(existing.method, "GET");
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(std::fs::read_to_string(dir.join("success-200.json")).unwrap(), before);

        assert!(registry.create_endpoint("/users", "POST").await.is_ok());
        assert!(registry.router().lookup("/users", HttpMethod::Post).is_some());
    }

    #[tokio::test]
    async fn test_reserved_prefix_rejected_without_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path());

        let err = registry.create_endpoint("/_mock/x", "GET").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!tmp.path().join("_mock").exists());

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Validation failed");
        assert!(body["details"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn test_created_endpoint_is_served() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path());
        registry.router().start().await.unwrap();

        registry.create_endpoint("/pets/{petId}", "GET").await.unwrap();
        let response = registry.router().handle("GET", "/pets/9").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"message": "string"}));
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_winner() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(registry(tmp.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create_endpoint("/race", "PUT").await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
