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

use crate::spec::{ResponseSpec, SchemaNode};
use crate::storage::layout::sanitize;
use crate::storage::store::{MockStore, StorageError, STATUS_FILE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

/// On-disk shape of one mock response: `{"header": [], "body": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockResponseFile {
    #[serde(default)]
    pub header: Vec<HeaderEntry>,
    #[serde(default)]
    pub body: Value,
}

/// Which response file is active for an endpoint, and how long to stall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatus {
    #[serde(rename = "selected")]
    #[schema(example = "success-200.json")]
    pub selected_file: String,
    #[serde(default)]
    #[schema(example = 0)]
    pub delay_millisecond: u64,
}

impl EndpointStatus {
    pub fn new(selected_file: impl Into<String>) -> Self {
        Self {
            selected_file: selected_file.into(),
            delay_millisecond: 0,
        }
    }
}

/// A response ready to be written: its body is already synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedResponse {
    pub status: String,
    pub description: String,
    pub body: Value,
}

/// `{sanitized description}-{status}.json`, e.g. `ok-200.json`.
pub fn response_filename(description: &str, status: &str) -> String {
    let mut stem = sanitize(description);
    if stem.is_empty() {
        stem = "response".to_string();
    }
    let mut code = sanitize(status);
    if code.is_empty() {
        code = "default".to_string();
    }
    format!("{}-{}.json", stem, code)
}

/// HTTP status encoded in a response filename; `None` for `default` and other
/// non-numeric codes.
pub fn status_code_of(filename: &str) -> Option<u16> {
    filename
        .strip_suffix(".json")?
        .rsplit('-')
        .next()?
        .parse::<u16>()
        .ok()
        .filter(|code| (100..600).contains(code))
}

/// Used when an operation declares no responses at all.
pub fn default_responses() -> Vec<ResponseSpec> {
    let error_body = || {
        Some(SchemaNode::object([
            ("error", SchemaNode::string()),
            ("message", SchemaNode::string()),
        ]))
    };

    vec![
        ResponseSpec::new(
            "200",
            "Success",
            Some(SchemaNode::object([("message", SchemaNode::string())])),
        ),
        ResponseSpec::new("400", "Bad Request", error_body()),
        ResponseSpec::new("404", "Not Found", error_body()),
        ResponseSpec::new("500", "Internal Server Error", error_body()),
    ]
}

/// Response set written for an endpoint created through the management API.
pub fn interactive_responses() -> Vec<ResponseSpec> {
    vec![
        ResponseSpec::new(
            "200",
            "Success",
            Some(SchemaNode::object([("message", SchemaNode::string())])),
        ),
        ResponseSpec::new(
            "default",
            "Unexpected error",
            Some(SchemaNode::object([
                ("code", SchemaNode::integer()),
                ("message", SchemaNode::string()),
            ])),
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct FileMaterializer {
    store: MockStore,
}

impl FileMaterializer {
    pub fn new(store: MockStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MockStore {
        &self.store
    }

    pub fn status_path(dir: &Path) -> PathBuf {
        dir.join(STATUS_FILE)
    }

    /// Writes one file per response, in order, and returns the file names.
    pub async fn materialize(
        &self,
        dir: &Path,
        responses: &[SynthesizedResponse],
    ) -> Result<Vec<String>, StorageError> {
        self.store.ensure_dir(dir).await?;

        let mut written = Vec::with_capacity(responses.len());
        for response in responses {
            let filename = response_filename(&response.description, &response.status);
            let file = MockResponseFile {
                header: Vec::new(),
                body: response.body.clone(),
            };
            self.store.write_json(&dir.join(&filename), &file).await?;
            debug!(dir = %dir.display(), file = %filename, "Materialized response");
            written.push(filename);
        }
        Ok(written)
    }

    pub async fn write_status(&self, dir: &Path, status: &EndpointStatus) -> Result<(), StorageError> {
        self.store.write_json(&Self::status_path(dir), status).await
    }

    pub async fn read_status(&self, dir: &Path) -> Result<EndpointStatus, StorageError> {
        self.store.read_json(&Self::status_path(dir)).await
    }

    pub async fn read_response(&self, dir: &Path, filename: &str) -> Result<MockResponseFile, StorageError> {
        self.store.read_json(&dir.join(filename)).await
    }
}
