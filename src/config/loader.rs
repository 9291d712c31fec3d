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

use crate::config::types::{Config, MockConfig, TelemetryConfig};
use anyhow::Context;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/mockspec.yaml";

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_str(&content)
    }

    /// Loads `path` when given, built-in defaults otherwise.
    /// Without an explicit path, `config/mockspec.yaml` is used when present.
    pub fn from_optional_file<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Config::default()),
        }
    }

    pub fn from_str(content: &str) -> anyhow::Result<Config> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).with_context(|| "Failed to parse YAML configuration")?
        };

        Self::validate(&config)?;

        Ok(config)
    }

    fn validate(config: &Config) -> anyhow::Result<()> {
        if config.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if config.server.workers == 0 {
            anyhow::bail!("Number of workers cannot be 0");
        }

        if let Some(public_url) = &config.server.public_url {
            Self::validate_http_url("Public URL", public_url)?;
        }

        Self::validate_mock_config(&config.mock)?;

        if config.telemetry.sampling_rate < 0.0 || config.telemetry.sampling_rate > 1.0 {
            anyhow::bail!("Sampling rate must be between 0.0 and 1.0");
        }

        let format = config.telemetry.log_format.to_lowercase();
        if format != "text" && format != "json" {
            anyhow::bail!(
                "Log format must be 'text' or 'json', got '{}'",
                config.telemetry.log_format
            );
        }

        if config.telemetry.enabled {
            Self::validate_telemetry_config(&config.telemetry)?;
        }

        Ok(())
    }

    fn validate_mock_config(config: &MockConfig) -> anyhow::Result<()> {
        if config.root.as_os_str().is_empty() {
            anyhow::bail!("Mock root directory cannot be empty");
        }

        if config.example_param_value.is_empty() || config.example_param_value.contains('/') {
            anyhow::bail!("Example parameter value must be a single non-empty path segment");
        }

        if config.max_request_events == 0 {
            anyhow::bail!("Request event capacity must be greater than 0");
        }

        Ok(())
    }

    fn validate_http_url(what: &str, value: &str) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(value)
            .map_err(|_| anyhow::anyhow!("Invalid {} format: {}", what.to_lowercase(), value))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            anyhow::bail!("{} must use http:// or https:// scheme", what);
        }

        if url.host().is_none() {
            anyhow::bail!("{} must have a host", what);
        }

        Ok(())
    }

    fn validate_telemetry_config(config: &TelemetryConfig) -> anyhow::Result<()> {
        if config.endpoint.is_empty() {
            anyhow::bail!("Telemetry endpoint cannot be empty");
        }

        Self::validate_http_url("Telemetry endpoint", &config.endpoint)?;

        let protocol = config.protocol.to_lowercase();
        if protocol != "http" && protocol != "grpc" {
            anyhow::bail!(
                "Telemetry protocol must be 'http' or 'grpc', got '{}'",
                config.protocol
            );
        }

        if config.timeout_seconds == 0 {
            anyhow::bail!("Telemetry timeout must be greater than 0");
        }

        Ok(())
    }
}
