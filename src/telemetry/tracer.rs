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

use crate::config::TelemetryConfig;
use crate::telemetry::attributes;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;
use std::future::ready;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};
use tracing::{info, Instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[cfg(feature = "otel")]
struct OtelProviders {
    tracer: opentelemetry_sdk::trace::SdkTracerProvider,
    logger: opentelemetry_sdk::logs::SdkLoggerProvider,
}

#[cfg(feature = "otel")]
static PROVIDERS: once_cell::sync::OnceCell<OtelProviders> = once_cell::sync::OnceCell::new();

/// Lets the W3C propagator read `traceparent`/`tracestate` from actix headers.
#[cfg(feature = "otel")]
struct ActixHeaderExtractor<'a>(&'a actix_web::http::header::HeaderMap);

#[cfg(feature = "otel")]
impl opentelemetry::propagation::Extractor for ActixHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// `RUST_LOG` wins over the configured level when set.
fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

#[cfg(feature = "otel")]
fn build_providers(config: &TelemetryConfig) -> anyhow::Result<OtelProviders> {
    use opentelemetry_otlp::WithExportConfig;
    use std::time::Duration;

    let timeout = Duration::from_secs(config.timeout_seconds);
    let http = config.protocol.eq_ignore_ascii_case("http");

    let span_exporter = if http {
        let endpoint = super::signal_endpoint(&config.endpoint, "traces");
        info!(endpoint = %endpoint, "Configuring HTTP exporter for tracing");
        opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()
    } else {
        info!(endpoint = %config.endpoint, "Configuring gRPC exporter for tracing");
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build()
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry span exporter build failed: {}", e))?;

    let log_exporter = if http {
        opentelemetry_otlp::LogExporter::builder()
            .with_http()
            .with_endpoint(super::signal_endpoint(&config.endpoint, "logs"))
            .with_timeout(timeout)
            .build()
    } else {
        opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build()
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry log exporter build failed: {}", e))?;

    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(super::resource(config))
        .with_sampler(opentelemetry_sdk::trace::Sampler::ParentBased(Box::new(
            opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(config.sampling_rate),
        )))
        .build();

    let logger = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(super::resource(config))
        .build();

    Ok(OtelProviders { tracer, logger })
}

/// Installs the global subscriber: the fmt layer always, the OpenTelemetry
/// span and log layers only when telemetry is enabled.
#[cfg(feature = "otel")]
pub async fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        info!("A tracing subscriber is already set, skipping initialization");
        return Ok(());
    }

    let (trace_layer, log_layer) = if config.enabled {
        let providers = build_providers(config)?;

        opentelemetry::global::set_tracer_provider(providers.tracer.clone());
        opentelemetry::global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );

        use opentelemetry::trace::TracerProvider as _;
        let trace_layer =
            tracing_opentelemetry::layer().with_tracer(providers.tracer.tracer("mockspec"));
        let log_layer =
            opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&providers.logger);
        let _ = PROVIDERS.set(providers);
        (Some(trace_layer), Some(log_layer))
    } else {
        (None, None)
    };

    let subscriber = Registry::default()
        .with(env_filter(config))
        .with(trace_layer)
        .with(log_layer);

    let _ = if config.log_format.eq_ignore_ascii_case("json") {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).try_init()
    };

    info!(
        otel = config.enabled,
        format = %config.log_format,
        level = %config.log_level,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(not(feature = "otel"))]
pub async fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        info!("A tracing subscriber is already set, skipping initialization");
        return Ok(());
    }

    let subscriber = Registry::default().with(env_filter(config));

    let _ = if config.log_format.eq_ignore_ascii_case("json") {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if config.enabled {
        info!("Telemetry requested but OpenTelemetry support is not compiled in");
    }
    Ok(())
}

#[cfg(feature = "otel")]
pub(crate) fn shutdown_tracing() {
    if let Some(providers) = PROVIDERS.get() {
        if let Err(e) = providers.tracer.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
        if let Err(e) = providers.logger.shutdown() {
            tracing::warn!(error = %e, "Logger provider shutdown failed");
        }
    }
}

pub fn tracing_middleware() -> TracingMiddleware {
    TracingMiddleware
}

/// Wraps every request in an `http.request` span and logs its outcome by
/// status class.
pub struct TracingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TracingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = TracingMiddlewareService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TracingMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct TracingMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TracingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let span = tracing::info_span!(
            "http.request",
            http.method = %req.method(),
            http.target = %req.path(),
            http.route = tracing::field::Empty,
            http.response.status_code = tracing::field::Empty,
            mock.endpoint = tracing::field::Empty,
            mock.response.file = tracing::field::Empty,
        );

        #[cfg(feature = "otel")]
        {
            use opentelemetry::propagation::TextMapPropagator;
            use tracing_opentelemetry::OpenTelemetrySpanExt;

            let propagator = opentelemetry_sdk::propagation::TraceContextPropagator::new();
            let parent_cx = propagator.extract(&ActixHeaderExtractor(req.headers()));
            let _ = span.set_parent(parent_cx);
        }

        let fut = self.service.call(req);
        let request_span = span.clone();

        Box::pin(
            async move {
                let response = fut.await?;
                let status = response.status().as_u16();
                request_span.record(attributes::http::RESPONSE_STATUS_CODE, status);

                match status {
                    200..=399 => tracing::debug!(status = status, "Request handled"),
                    400..=499 => tracing::info!(status = status, "Client error"),
                    _ => tracing::warn!(status = status, "Server error"),
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use actix_web::web;
    use actix_web::App;
    use actix_web::HttpResponse;

    #[actix_web::test]
    async fn test_tracing_middleware() {
        let app = test::init_service(App::new().wrap(tracing_middleware()).route(
            "/test",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_tracing_middleware_passes_status_through() {
        let app = test::init_service(
            App::new()
                .wrap(tracing_middleware())
                .route(
                    "/created",
                    web::post().to(|| async { HttpResponse::Created().finish() }),
                )
                .route(
                    "/error",
                    web::get().to(|| async { HttpResponse::InternalServerError().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::post().uri("/created").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        let req = test::TestRequest::get().uri("/error").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 500);

        let req = test::TestRequest::get().uri("/unrouted").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn test_tracing_middleware_with_traceparent_header() {
        let app = test::init_service(App::new().wrap(tracing_middleware()).route(
            "/propagate",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/propagate")
            .insert_header((
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}
