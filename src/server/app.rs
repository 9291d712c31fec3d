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

use crate::config::Config;
use crate::registry::{EndpointRegistry, FieldViolation};
use crate::router::RuntimeRouter;
use crate::server::handlers;
use crate::server::openapi::ApiDoc;
use crate::telemetry::tracing_middleware;
use actix_web::dev::Server;
use actix_web::http::header;
use actix_web::web;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::{SwaggerUi, Url};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub router: Arc<RuntimeRouter>,
    pub registry: Arc<EndpointRegistry>,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<EndpointRegistry>) -> Self {
        Self {
            config,
            router: registry.router().clone(),
            registry,
        }
    }
}

/// Malformed bodies are reported in the same shape as validation failures.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(|err, _req| {
        let details = vec![FieldViolation {
            field: "body".to_string(),
            message: err.to_string(),
        }];
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid request body",
            "details": details,
        }));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

/// Registers every route. Management and docs routes come first, everything
/// else falls through to the mock router.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let openapi = ApiDoc::openapi();
    let swagger_urls = vec![(Url::new("mockspec API", "/_mock/api-docs/openapi.json"), openapi)];

    cfg.service(
        web::resource("/_mock/endpoints")
            .route(web::post().to(handlers::create_endpoint_handler))
            .route(web::get().to(handlers::list_endpoints_handler)),
    )
    .service(web::resource("/_mock/endpoints/status").route(web::put().to(handlers::update_status_handler)))
    .service(web::resource("/_mock/requests").route(web::get().to(handlers::recent_requests_handler)))
    .service(web::resource("/_mock/health").to(handlers::health_handler))
    .service(web::resource("/_mock/api-docs/openapi.json").to(openapi_json_handler))
    .service(SwaggerUi::new("/_mock/swagger-ui/{_:.*}").urls(swagger_urls))
    .default_service(web::to(handlers::mock_handler));
}

pub async fn run_server(config: Config, registry: Arc<EndpointRegistry>) -> anyhow::Result<Server> {
    let server_config = config.server.clone();
    let addr = format!("{}:{}", server_config.host, server_config.port);

    info!(
        addr = %addr,
        workers = server_config.workers,
        max_request_size = server_config.max_request_size,
        mock_root = %config.mock.root.display(),
        "Starting server"
    );

    let state = AppState::new(config, registry);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(tracing_middleware())
            .app_data(web::Data::new(state.clone()))
            .app_data(json_config(state.config.server.max_request_size))
            .configure(configure)
    })
    .workers(server_config.workers)
    .bind(addr)?
    .run();

    Ok(server)
}

async fn openapi_json_handler() -> impl Responder {
    match serde_json::to_string(&ApiDoc::openapi()) {
        Ok(json) => HttpResponse::Ok()
            .insert_header(header::ContentType::json())
            .body(json),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Failed to render OpenAPI document",
            "detail": e.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStore;
    use actix_web::test;

    #[actix_web::test]
    async fn test_openapi_document_served() {
        let tmp = tempfile::tempdir().unwrap();
        let router = Arc::new(RuntimeRouter::new(MockStore::new(tmp.path()), 10));
        let registry = Arc::new(EndpointRegistry::new(router, "http://localhost:8080", "123"));
        let state = AppState::new(Config::default(), registry);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/_mock/api-docs/openapi.json").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["paths"].get("/_mock/endpoints").is_some());
        assert!(body["paths"].get("/_mock/endpoints/status").is_some());
    }

    #[actix_web::test]
    async fn test_malformed_json_body() {
        let tmp = tempfile::tempdir().unwrap();
        let router = Arc::new(RuntimeRouter::new(MockStore::new(tmp.path()), 10));
        let registry = Arc::new(EndpointRegistry::new(router, "http://localhost:8080", "123"));
        let state = AppState::new(Config::default(), registry);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(json_config(1024))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/_mock/endpoints")
            .insert_header(header::ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["details"][0]["field"], "body");
    }
}
