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

use crate::spec::document::{SpecDocument, SpecError};
use crate::spec::resolver::{CollectingSink, DiagnosticSink, TeeSink};
use crate::spec::synth::MockSynthesizer;
use crate::storage::materializer::{default_responses, FileMaterializer, SynthesizedResponse};
use crate::storage::{layout, MockStore, StorageError};
use crate::telemetry::metrics::record_generation;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub files_created: usize,
    pub paths_processed: usize,
    pub endpoints_created: usize,
    pub diagnostics: usize,
}

/// Specification document in, mock directory tree out.
///
/// Paths and methods are processed sequentially in document order. A malformed
/// document aborts before anything is written; schema problems only degrade the
/// affected body to null.
pub struct SpecPipeline {
    sink: Arc<dyn DiagnosticSink>,
}

impl SpecPipeline {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    pub async fn run(&self, spec_path: &Path, output_root: &Path) -> Result<GenerationReport, PipelineError> {
        info!(spec = %spec_path.display(), output = %output_root.display(), "Generating mocks");
        let document = SpecDocument::load(spec_path).await?;
        self.run_document(&document, output_root).await
    }

    pub async fn run_document(
        &self,
        document: &SpecDocument,
        output_root: &Path,
    ) -> Result<GenerationReport, PipelineError> {
        let counter = CollectingSink::new();
        let sink = TeeSink(self.sink.as_ref(), &counter);
        let synthesizer = MockSynthesizer::new(document, &sink);
        let materializer = FileMaterializer::new(MockStore::new(output_root));

        let mut report = GenerationReport::default();
        for item in &document.paths {
            for route in &item.routes {
                let dir = match layout::map_to_directory(output_root, &route.path, route.method) {
                    Ok(dir) => dir,
                    Err(e) => {
                        warn!(method = %route.method, path = %route.path, error = %e, "Skipping route");
                        continue;
                    }
                };

                let declared;
                let responses = if route.responses.is_empty() {
                    declared = default_responses();
                    &declared
                } else {
                    &route.responses
                };

                let bodies: Vec<SynthesizedResponse> = responses
                    .iter()
                    .map(|response| SynthesizedResponse {
                        status: response.status.clone(),
                        description: response.description.clone(),
                        body: response
                            .schema
                            .as_ref()
                            .map(|schema| synthesizer.synthesize(schema))
                            .unwrap_or(Value::Null),
                    })
                    .collect();

                let written = materializer.materialize(&dir, &bodies).await?;
                info!(
                    method = %route.method,
                    path = %route.path,
                    files = written.len(),
                    "Generated endpoint mocks"
                );
                report.files_created += written.len();
                report.endpoints_created += 1;
            }
            report.paths_processed += 1;
        }
        report.diagnostics = counter.len();

        record_generation(report.files_created as u64);
        info!(
            files_created = report.files_created,
            paths_processed = report.paths_processed,
            endpoints_created = report.endpoints_created,
            diagnostics = report.diagnostics,
            "Mock generation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::resolver::TracingSink;
    use serde_json::json;

    fn pipeline() -> SpecPipeline {
        SpecPipeline::new(Arc::new(TracingSink))
    }

    #[tokio::test]
    async fn test_default_responses_when_none_declared() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = SpecDocument::from_value(&json!({"paths": {"/health": {"get": {}}}})).unwrap();

        let report = pipeline().run_document(&doc, tmp.path()).await.unwrap();
        assert_eq!(report.files_created, 4);
        assert_eq!(report.endpoints_created, 1);

        let dir = tmp.path().join("health/GET");
        for name in [
            "success-200.json",
            "bad-request-400.json",
            "not-found-404.json",
            "internal-server-error-500.json",
        ] {
            assert!(dir.join(name).is_file(), "missing {}", name);
        }
        // bulk generation leaves status selection to the router
        assert!(!dir.join("status.json").exists());
    }

    #[tokio::test]
    async fn test_unresolved_ref_degrades_to_null() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = SpecDocument::from_value(&json!({"paths": {"/x": {"get": {"responses": {
            "200": {"description": "OK", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Gone"}}}},
            "201": {"description": "Created", "content": {"application/json": {"schema": {"type": "boolean"}}}}
        }}}}}))
        .unwrap();

        let report = pipeline().run_document(&doc, tmp.path()).await.unwrap();
        assert_eq!(report.files_created, 2);
        assert_eq!(report.diagnostics, 1);

        let ok: Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("x/GET/ok-200.json")).unwrap()).unwrap();
        assert_eq!(ok, json!({"header": [], "body": null}));
        let created: Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("x/GET/created-201.json")).unwrap())
                .unwrap();
        assert_eq!(created["body"], json!(true));
    }

    #[tokio::test]
    async fn test_reserved_paths_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = SpecDocument::from_value(&json!({"paths": {
            "/_mock/endpoints": {"get": {}},
            "/ok": {"get": {}}
        }}))
        .unwrap();

        let report = pipeline().run_document(&doc, tmp.path()).await.unwrap();
        assert_eq!(report.endpoints_created, 1);
        assert_eq!(report.paths_processed, 2);
        assert!(!tmp.path().join("_mock").exists());
    }

    #[tokio::test]
    async fn test_missing_spec_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let result = pipeline()
            .run(&tmp.path().join("absent.json"), &tmp.path().join("out"))
            .await;
        assert!(matches!(result, Err(PipelineError::Spec(SpecError::Read { .. }))));
        assert!(!tmp.path().join("out").exists());
    }
}
