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

use crate::registry::{CreatedEndpoint, ExistingEndpoint, FieldViolation};
use crate::router::state::RequestEvent;
use crate::router::EndpointView;
use crate::storage::EndpointStatus;
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mockspec API",
        description = "Management API of the OpenAPI-driven mock server",
        version = "0.1.0",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    paths(
        super::handlers::health_handler,
        super::handlers::create_endpoint_handler,
        super::handlers::list_endpoints_handler,
        super::handlers::update_status_handler,
        super::handlers::recent_requests_handler,
        mock_handler_path
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            ValidationErrorResponse,
            DuplicateEndpointResponse,
            CreateEndpointRequest,
            CreateEndpointResponse,
            CreatedEndpoint,
            ExistingEndpoint,
            FieldViolation,
            EndpointList,
            EndpointView,
            EndpointStatus,
            StatusUpdateRequest,
            RequestLog,
            RequestEvent
        )
    ),
    tags(
        (name = "System", description = "System endpoints"),
        (name = "Management", description = "Create and control mock endpoints"),
        (name = "Mock", description = "Generated mock responses")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/{path}",
    tag = "Mock",
    params(
        ("path" = String, Path, description = "Any path registered as a mock endpoint")
    ),
    responses(
        (status = 200, description = "Selected mock response; the status comes from the selected file"),
        (status = 404, description = "No mock endpoint matches", body = ErrorResponse),
        (status = 503, description = "Router is not running", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub fn mock_handler_path() {}

#[derive(ToSchema, Serialize)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "mockspec")]
    pub service: String,
    #[schema(example = "running")]
    pub router: String,
    #[schema(example = 12)]
    pub endpoints: usize,
    #[schema(example = "2026-01-01T00:00:00Z")]
    pub timestamp: String,
}

#[derive(ToSchema, Serialize)]
pub struct ErrorResponse {
    #[schema(example = "no mock endpoint for GET /nope")]
    pub error: String,
    pub detail: Option<String>,
}

#[derive(ToSchema, Serialize)]
pub struct ValidationErrorResponse {
    #[schema(example = "Validation failed")]
    pub error: String,
    pub details: Vec<FieldViolation>,
}

#[derive(ToSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateEndpointResponse {
    #[schema(example = "Endpoint already exists")]
    pub error: String,
    pub existing_endpoint: ExistingEndpoint,
}

/// Missing fields arrive as empty strings and are reported by validation.
#[derive(Debug, Clone, ToSchema, Deserialize)]
pub struct CreateEndpointRequest {
    #[serde(default)]
    #[schema(example = "/pets/{petId}")]
    pub path: String,
    #[serde(default)]
    #[schema(example = "GET")]
    pub method: String,
}

#[derive(ToSchema, Serialize)]
pub struct CreateEndpointResponse {
    pub success: bool,
    #[schema(example = "Mock endpoint GET /pets/{petId} created")]
    pub message: String,
    pub endpoint: CreatedEndpoint,
}

#[derive(ToSchema, Serialize)]
pub struct EndpointList {
    pub endpoints: Vec<EndpointView>,
}

#[derive(Debug, Clone, ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[schema(example = "/pets/{petId}")]
    pub path: String,
    #[schema(example = "GET")]
    pub method: String,
    #[schema(example = "not-found-404.json")]
    pub selected: String,
    #[serde(default)]
    #[schema(example = 250)]
    pub delay_millisecond: u64,
}

#[derive(ToSchema, Serialize)]
pub struct RequestLog {
    pub requests: Vec<RequestEvent>,
}
