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

use crate::registry::RegistryError;
use crate::router::{RouterError, RouterResponse};
use crate::server::app::AppState;
use crate::server::openapi::{
    CreateEndpointRequest, CreateEndpointResponse, DuplicateEndpointResponse, EndpointList,
    ErrorResponse, HealthResponse, RequestLog, StatusUpdateRequest, ValidationErrorResponse,
};
use crate::spec::HttpMethod;
use crate::storage::EndpointStatus;
use crate::telemetry::attributes;
use crate::telemetry::metrics::{record_error, record_latency, record_request};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::ResponseError;
use std::time::Instant;
use tracing::{info, warn};

#[utoipa::path(
    get,
    path = "/_mock/health",
    tag = "System",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "mockspec".to_string(),
        router: data.router.state().to_string(),
        endpoints: data.router.endpoint_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    post,
    path = "/_mock/endpoints",
    tag = "Management",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created", body = CreateEndpointResponse),
        (status = 400, description = "Validation failed", body = ValidationErrorResponse),
        (status = 409, description = "Endpoint already exists", body = DuplicateEndpointResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn create_endpoint_handler(
    data: web::Data<AppState>,
    body: web::Json<CreateEndpointRequest>,
) -> Result<HttpResponse, RegistryError> {
    let request = body.into_inner();
    let endpoint = data
        .registry
        .create_endpoint(request.path.trim(), request.method.trim())
        .await
        .inspect_err(|e| warn!(path = %request.path, method = %request.method, error = %e, "Endpoint creation rejected"))?;

    Ok(HttpResponse::Created().json(CreateEndpointResponse {
        success: true,
        message: format!("Mock endpoint {} {} created", endpoint.method, endpoint.path),
        endpoint,
    }))
}

#[utoipa::path(
    get,
    path = "/_mock/endpoints",
    tag = "Management",
    responses(
        (status = 200, description = "Registered endpoints", body = EndpointList)
    )
)]
pub async fn list_endpoints_handler(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(EndpointList {
        endpoints: data.router.describe().await,
    })
}

#[utoipa::path(
    put,
    path = "/_mock/endpoints/status",
    tag = "Management",
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = EndpointStatus),
        (status = 400, description = "Unknown response file or method", body = ErrorResponse),
        (status = 404, description = "Unknown endpoint", body = ErrorResponse)
    )
)]
pub async fn update_status_handler(
    data: web::Data<AppState>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, RouterError> {
    let request = body.into_inner();
    let method: HttpMethod = request.method.parse()?;
    let status = data
        .router
        .select_response(&request.path, method, &request.selected, request.delay_millisecond)
        .await?;
    Ok(HttpResponse::Ok().json(status))
}

#[utoipa::path(
    get,
    path = "/_mock/requests",
    tag = "Management",
    responses(
        (status = 200, description = "Recent requests, oldest first", body = RequestLog)
    )
)]
pub async fn recent_requests_handler(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(RequestLog {
        requests: data.router.recent_requests(),
    })
}

/// Answers every request not claimed by a management route.
pub async fn mock_handler(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let result = data.router.handle(&method, &path).await;
    let latency = start_time.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(response) => {
            record_request(&method, &response.route, response.status);
            record_latency(&method, &response.route, latency);
            let span = tracing::Span::current();
            span.record(attributes::http::ROUTE, response.route.as_str());
            span.record(attributes::mock::ENDPOINT, response.route.as_str());
            span.record(attributes::mock::RESPONSE_FILE, response.selected_file.as_str());
            info!(
                request_id = %request_id,
                response_file = %response.selected_file,
                status = response.status,
                latency_ms = latency,
                "Mock response served"
            );
            into_http_response(response, &request_id)
        }
        Err(e) => {
            record_request(&method, &path, e.status_code().as_u16());
            record_latency(&method, &path, latency);
            record_error(&method, &path, e.kind());
            e.error_response()
        }
    }
}

fn into_http_response(response: RouterResponse, request_id: &str) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    builder.insert_header(("x-request-id", request_id));

    for entry in &response.headers {
        match (
            HeaderName::from_bytes(entry.key.as_bytes()),
            HeaderValue::from_str(&entry.value),
        ) {
            (Ok(name), Ok(value)) => {
                builder.insert_header((name, value));
            }
            _ => warn!(header = %entry.key, "Skipping invalid mock header"),
        }
    }

    builder.json(response.body)
}
