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

//! Attribute names shared by spans, logs and metrics.
//!
//! HTTP names follow the OpenTelemetry semantic conventions:
//! - https://opentelemetry.io/docs/specs/semconv/http/http-spans/

pub mod http {
    pub const METHOD: &str = "http.method";

    pub const ROUTE: &str = "http.route";

    pub const TARGET: &str = "http.target";

    pub const RESPONSE_STATUS_CODE: &str = "http.response.status_code";
}

/// Mock-specific attributes.
pub mod mock {
    /// Template of the endpoint that answered the request.
    pub const ENDPOINT: &str = "mock.endpoint";

    pub const RESPONSE_FILE: &str = "mock.response.file";
}

pub mod error {
    pub const TYPE: &str = "error.type";
}

#[cfg(feature = "otel")]
pub mod kv {
    use opentelemetry::KeyValue;

    use super::http;

    pub fn http_method(method: impl Into<String>) -> KeyValue {
        KeyValue::new(http::METHOD, method.into())
    }

    pub fn http_route(route: impl Into<String>) -> KeyValue {
        KeyValue::new(http::ROUTE, route.into())
    }

    /// Status codes are recorded as integers, not strings.
    pub fn http_response_status_code(status: u16) -> KeyValue {
        KeyValue::new(http::RESPONSE_STATUS_CODE, status as i64)
    }

    pub fn error_type(error_type: impl Into<String>) -> KeyValue {
        KeyValue::new(super::error::TYPE, error_type.into())
    }
}
