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
use tracing::{debug, info};

#[cfg(feature = "otel")]
use crate::telemetry::attributes;

pub const REQUEST_COUNT: &str = "mock_server_request_count_total";
pub const REQUEST_DURATION: &str = "mock_server_request_duration";
pub const ERROR_COUNT: &str = "mock_server_error_count_total";
pub const GENERATED_FILES: &str = "mock_generation_files_total";

#[cfg(feature = "otel")]
static METER_PROVIDER: once_cell::sync::OnceCell<opentelemetry_sdk::metrics::SdkMeterProvider> =
    once_cell::sync::OnceCell::new();

#[cfg(feature = "otel")]
pub async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<()> {
    use opentelemetry_otlp::WithExportConfig;
    use std::time::Duration;

    if !config.enabled {
        info!("Metrics are disabled");
        return Ok(());
    }

    let timeout = Duration::from_secs(config.timeout_seconds);
    let exporter = match config.protocol.to_lowercase().as_str() {
        "http" => {
            let endpoint = super::signal_endpoint(&config.endpoint, "metrics");
            info!(endpoint = %endpoint, "Configuring HTTP exporter for metrics");
            opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .with_timeout(timeout)
                .build()
        }
        _ => {
            info!(endpoint = %config.endpoint, "Configuring gRPC exporter for metrics");
            opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_endpoint(&config.endpoint)
                .with_timeout(timeout)
                .build()
        }
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry metric exporter build failed: {}", e))?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(10))
        .build();

    let meter_provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(super::resource(config))
        .build();

    opentelemetry::global::set_meter_provider(meter_provider.clone());
    let _ = METER_PROVIDER.set(meter_provider);

    info!("OpenTelemetry metrics initialized");
    Ok(())
}

#[cfg(not(feature = "otel"))]
pub async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<()> {
    if config.enabled {
        info!("Metrics requested but OpenTelemetry support is not compiled in");
    }
    Ok(())
}

#[cfg(feature = "otel")]
pub(crate) fn shutdown_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

#[cfg(feature = "otel")]
fn meter() -> opentelemetry::metrics::Meter {
    opentelemetry::global::meter("mockspec")
}

/// `route` is the matched endpoint template, or the raw path when nothing matched.
#[cfg(feature = "otel")]
pub fn record_request(method: &str, route: &str, status: u16) {
    let counter = meter()
        .u64_counter(REQUEST_COUNT)
        .with_description("Total number of requests answered by the mock router")
        .build();

    counter.add(
        1,
        &[
            attributes::kv::http_method(method),
            attributes::kv::http_route(route),
            attributes::kv::http_response_status_code(status),
        ],
    );

    info!(method = %method, route = %route, status = status, "Request completed");
}

#[cfg(feature = "otel")]
pub fn record_error(method: &str, route: &str, error_type: &str) {
    let counter = meter()
        .u64_counter(ERROR_COUNT)
        .with_description("Total number of failed mock requests")
        .build();

    counter.add(
        1,
        &[
            attributes::kv::http_method(method),
            attributes::kv::http_route(route),
            attributes::kv::error_type(error_type),
        ],
    );

    tracing::warn!(method = %method, route = %route, error_type = %error_type, "Request error");
}

#[cfg(feature = "otel")]
pub fn record_latency(method: &str, route: &str, latency_ms: f64) {
    let histogram = meter()
        .f64_histogram(REQUEST_DURATION)
        .with_description("Mock request duration in seconds, including simulated delay")
        .with_unit("s")
        .build();

    histogram.record(
        latency_ms / 1000.0,
        &[attributes::kv::http_method(method), attributes::kv::http_route(route)],
    );

    debug!(method = %method, route = %route, latency_ms = latency_ms, "Request latency");
}

#[cfg(feature = "otel")]
pub fn record_generation(files: u64) {
    let counter = meter()
        .u64_counter(GENERATED_FILES)
        .with_description("Total number of mock response files generated")
        .build();

    counter.add(files, &[]);
    debug!(files = files, "Generation recorded");
}

#[cfg(not(feature = "otel"))]
pub fn record_request(method: &str, route: &str, status: u16) {
    info!(method = %method, route = %route, status = status, "Request completed");
}

#[cfg(not(feature = "otel"))]
pub fn record_error(method: &str, route: &str, error_type: &str) {
    tracing::warn!(method = %method, route = %route, error_type = %error_type, "Request error");
}

#[cfg(not(feature = "otel"))]
pub fn record_latency(method: &str, route: &str, latency_ms: f64) {
    debug!(method = %method, route = %route, latency_ms = latency_ms, "Request latency");
}

#[cfg(not(feature = "otel"))]
pub fn record_generation(files: u64) {
    debug!(files = files, "Generation recorded");
}
