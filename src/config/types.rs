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

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mock: MockConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Base URL used when reporting where a new endpoint is served.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = if self.host == "0.0.0.0" { "localhost" } else { &self.host };
                format!("http://{}:{}", host, self.port)
            }
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    4
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_request_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Substituted for `{param}` segments in reported URLs.
    #[serde(default = "default_example_param_value")]
    pub example_param_value: String,
    #[serde(default = "default_max_request_events")]
    pub max_request_events: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from("mocks")
}

fn default_example_param_value() -> String {
    "123".to_string()
}

fn default_max_request_events() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_service_name() -> String {
    "mockspec".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_protocol() -> String {
    "grpc".to_string()
}

fn default_sampling_rate() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            workers: default_workers(),
            host: default_host(),
            max_request_size: default_max_request_size(),
            public_url: None,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            example_param_value: default_example_param_value(),
            max_request_events: default_max_request_events(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: default_service_name(),
            service_version: default_service_version(),
            endpoint: default_endpoint(),
            protocol: default_protocol(),
            sampling_rate: default_sampling_rate(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
