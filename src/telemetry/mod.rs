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

pub mod attributes;
pub mod metrics;
pub mod tracer;

pub use metrics::init_metrics;
pub use tracer::{init_tracing, tracing_middleware};

use crate::config::TelemetryConfig;
use anyhow::Context;
use std::time::Duration;
use tracing::{error, info, warn};

/// OTLP/HTTP wants one URL per signal (`/v1/traces`, `/v1/logs`, `/v1/metrics`).
pub(crate) fn signal_endpoint(endpoint: &str, signal: &str) -> String {
    let suffix = format!("v1/{}", signal);
    if endpoint.contains(&format!("/{}", suffix)) {
        endpoint.to_string()
    } else if endpoint.ends_with('/') {
        format!("{}{}", endpoint, suffix)
    } else {
        format!("{}/{}", endpoint, suffix)
    }
}

#[cfg(feature = "otel")]
pub(crate) fn resource(config: &TelemetryConfig) -> opentelemetry_sdk::Resource {
    use opentelemetry::KeyValue;

    opentelemetry_sdk::Resource::builder()
        .with_attributes(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
        ])
        .build()
}

/// Probes the collector once: any HTTP answer counts for OTLP/HTTP, an open
/// TCP connection for gRPC.
async fn test_connectivity(endpoint: &str, protocol: &str) -> anyhow::Result<()> {
    let url = reqwest::Url::parse(endpoint).context("Invalid collector endpoint")?;

    if protocol.eq_ignore_ascii_case("http") {
        reqwest::Client::new()
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Failed to reach OpenTelemetry collector")?;
    } else {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Collector endpoint has no host"))?;
        let port = url.port_or_known_default().unwrap_or(4317);
        tokio::time::timeout(
            Duration::from_secs(5),
            tokio::net::TcpStream::connect((host, port)),
        )
        .await
        .context("Timed out connecting to OpenTelemetry collector")?
        .context("Failed to connect to OpenTelemetry collector")?;
    }
    Ok(())
}

async fn test_connectivity_with_retry(endpoint: &str, protocol: &str) -> anyhow::Result<()> {
    let max_retries = 3;
    let mut retry_delay = Duration::from_millis(500);

    for attempt in 1..=max_retries {
        match test_connectivity(endpoint, protocol).await {
            Ok(()) => {
                info!(attempt = attempt, "Collector is reachable");
                return Ok(());
            }
            Err(e) if attempt == max_retries => return Err(e),
            Err(e) => {
                warn!(attempt = attempt, error = %e, "Collector connectivity attempt failed");
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }
        }
    }

    Err(anyhow::anyhow!("Collector connectivity check did not run"))
}

/// Installs logging and, when enabled, OpenTelemetry export of traces, logs
/// and metrics.
pub async fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_tracing(config)
        .await
        .context("Failed to initialize tracing")?;

    if !config.enabled {
        return Ok(());
    }

    // An unreachable collector is reported but never stops the server.
    if let Err(e) = test_connectivity_with_retry(&config.endpoint, &config.protocol).await {
        error!(
            endpoint = %config.endpoint,
            error = %e,
            "OpenTelemetry collector is unreachable; telemetry will not be exported"
        );
    }

    init_metrics(config)
        .await
        .context("Failed to initialize metrics")?;

    info!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    info!("Shutting down telemetry");

    #[cfg(feature = "otel")]
    {
        tracer::shutdown_tracing();
        metrics::shutdown_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_disabled_telemetry() {
        let config = TelemetryConfig {
            enabled: false,
            log_format: "json".to_string(),
            ..TelemetryConfig::default()
        };

        assert!(init_telemetry(&config).await.is_ok());
        // a second call finds the subscriber already installed
        assert!(init_telemetry(&config).await.is_ok());
        shutdown_telemetry().await;
    }

    #[test]
    fn test_signal_endpoint() {
        assert_eq!(
            signal_endpoint("http://localhost:4318", "traces"),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://localhost:4318/", "logs"),
            "http://localhost:4318/v1/logs"
        );
        assert_eq!(
            signal_endpoint("http://collector/v1/metrics", "metrics"),
            "http://collector/v1/metrics"
        );
    }

    #[tokio::test]
    async fn test_connectivity_rejects_bad_endpoint() {
        assert!(test_connectivity("not a url", "grpc").await.is_err());
    }

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.service_name, "mockspec");
        assert_eq!(config.endpoint, "http://localhost:4317");
        assert_eq!(config.protocol, "grpc");
        assert_eq!(config.sampling_rate, 1.0);
    }
}
