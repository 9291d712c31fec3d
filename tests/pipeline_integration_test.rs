use assert_json_diff::assert_json_eq;
use mockspec::router::RuntimeRouter;
use mockspec::spec::{CollectingSink, DiagnosticKind, PipelineError, SpecError, SpecPipeline};
use mockspec::storage::MockStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_pets_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = tmp.path().join("petstore.json");
    std::fs::write(
        &spec,
        json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets/{petId}": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {"application/json": {"schema": {
                                    "type": "object",
                                    "properties": {"id": {"type": "integer", "minimum": 1}}
                                }}}
                            }
                        }
                    }
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let out = tmp.path().join("mocks");
    let report = SpecPipeline::new(Arc::new(CollectingSink::new()))
        .run(&spec, &out)
        .await
        .unwrap();
    assert_eq!(report.files_created, 1);
    assert_eq!(report.paths_processed, 1);

    assert_json_eq!(
        read_json(&out.join("pets/{petId}/GET/ok-200.json")),
        json!({"header": [], "body": {"id": 1}})
    );
}

#[tokio::test]
async fn test_yaml_components_and_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = tmp.path().join("api.yaml");
    std::fs::write(
        &spec,
        r##"
openapi: 3.0.0
paths:
  /Users:
    get:
      responses:
        "200":
          description: User list
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: "#/components/schemas/User"
        "404":
          $ref: "#/components/responses/NotFound"
    trace:
      responses: {}
    x-internal: true
  /nodes:
    post:
      responses:
        "201":
          description: Created
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Node"
components:
  schemas:
    User:
      allOf:
        - type: object
          properties:
            id: { type: string, format: uuid }
        - type: object
          properties:
            email: { type: string, format: email }
            role: { type: string, enum: [admin, viewer] }
    Node:
      type: object
      properties:
        name: { type: string }
        children:
          type: array
          items:
            $ref: "#/components/schemas/Node"
  responses:
    NotFound:
      description: Not found
      content:
        application/json:
          schema:
            type: object
            properties:
              error: { type: string }
"##,
    )
    .unwrap();

    let sink = Arc::new(CollectingSink::new());
    let out = tmp.path().join("mocks");
    let report = SpecPipeline::new(sink.clone()).run(&spec, &out).await.unwrap();

    assert_eq!(report.paths_processed, 2);
    assert_eq!(report.endpoints_created, 2);
    assert_eq!(report.files_created, 3);

    assert_json_eq!(
        read_json(&out.join("users/GET/user-list-200.json"))["body"],
        json!([{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "email": "user@example.com",
            "role": "admin"
        }])
    );
    assert_json_eq!(
        read_json(&out.join("users/GET/not-found-404.json"))["body"],
        json!({"error": "string"})
    );
    assert_json_eq!(
        read_json(&out.join("nodes/POST/created-201.json"))["body"],
        json!({"name": "string", "children": [null]})
    );
    assert!(!out.join("users/TRACE").exists());

    let diagnostics = sink.take();
    assert!(diagnostics.iter().any(|d| d.kind == DiagnosticKind::CyclicRef));
}

#[tokio::test]
async fn test_malformed_document_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = tmp.path().join("broken.json");
    std::fs::write(&spec, "{\"paths\": [1, 2").unwrap();

    let out = tmp.path().join("mocks");
    let result = SpecPipeline::new(Arc::new(CollectingSink::new())).run(&spec, &out).await;
    assert!(matches!(result, Err(PipelineError::Spec(SpecError::Parse(_)))));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_generated_tree_is_served() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = tmp.path().join("api.json");
    std::fs::write(
        &spec,
        json!({"paths": {
            "/orders/{orderId}": {"get": {"responses": {
                "404": {"description": "Missing", "content": {"application/json": {"schema": {"type": "object", "properties": {"error": {"type": "string"}}}}}},
                "200": {"description": "Order", "content": {"application/json": {"schema": {"type": "object", "properties": {"total": {"type": "number", "maximum": 9}}}}}}
            }}},
            "/health": {"get": {}}
        }})
        .to_string(),
    )
    .unwrap();

    let out = tmp.path().join("mocks");
    SpecPipeline::new(Arc::new(CollectingSink::new()))
        .run(&spec, &out)
        .await
        .unwrap();

    let router = RuntimeRouter::new(MockStore::new(&out), 100);
    router.start().await.unwrap();
    assert_eq!(router.endpoint_count(), 2);

    // no status.json yet: the first 2xx file answers
    let response = router.handle("GET", "/orders/77").await.unwrap();
    assert_eq!(response.status, 200);
    assert_json_eq!(response.body, json!({"total": 4}));

    let response = router.handle("GET", "/health").await.unwrap();
    assert_eq!(response.selected_file, "success-200.json");
    assert_json_eq!(response.body, json!({"message": "string"}));
}
