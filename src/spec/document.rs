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

//! Typed view over an OpenAPI 3 / Swagger 2 document.
//!
//! Only the subset needed for mock synthesis is kept: paths, methods, declared
//! responses and schema nodes. Everything else in the document is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("failed to read specification {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed specification: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method '{0}'")]
pub struct UnsupportedMethod(pub String);

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Exact, case-sensitive match against a request-line method token.
    pub fn from_wire(token: &str) -> Option<HttpMethod> {
        HttpMethod::ALL.into_iter().find(|m| m.as_str() == token)
    }
}

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed unit of a JSON Schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Ref {
        target: String,
    },
    Object {
        properties: Vec<(String, SchemaNode)>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    String {
        enum_values: Vec<Value>,
        format: Option<String>,
    },
    Number {
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Literal {
        example: Value,
    },
    AllOf(Vec<SchemaNode>),
    OneOf(Vec<SchemaNode>),
    /// No type information at all (`{}`): any value is acceptable.
    Any,
    Unknown {
        detail: String,
    },
}

impl SchemaNode {
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        SchemaNode::Object {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn string() -> Self {
        SchemaNode::String {
            enum_values: Vec::new(),
            format: None,
        }
    }

    pub fn integer() -> Self {
        SchemaNode::Number {
            integer: true,
            minimum: None,
            maximum: None,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return SchemaNode::Unknown {
                detail: format!("schema is not an object: {}", value),
            };
        };

        if let Some(target) = obj.get("$ref") {
            return match target.as_str() {
                Some(target) => SchemaNode::Ref {
                    target: target.to_string(),
                },
                None => SchemaNode::Unknown {
                    detail: "$ref is not a string".to_string(),
                },
            };
        }

        if let Some(example) = obj.get("example") {
            return SchemaNode::Literal {
                example: example.clone(),
            };
        }

        if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
            return SchemaNode::AllOf(members.iter().map(SchemaNode::from_value).collect());
        }
        for key in ["oneOf", "anyOf"] {
            if let Some(members) = obj.get(key).and_then(Value::as_array) {
                return SchemaNode::OneOf(members.iter().map(SchemaNode::from_value).collect());
            }
        }

        let enum_values: Vec<Value> = obj
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let kind = schema_type(obj);
        if kind != Some("string") {
            if let Some(first) = enum_values.first() {
                return SchemaNode::Literal {
                    example: first.clone(),
                };
            }
        }

        match kind {
            Some("object") => SchemaNode::Object {
                properties: obj
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, schema)| (name.clone(), SchemaNode::from_value(schema)))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            Some("array") => SchemaNode::Array {
                items: Box::new(
                    obj.get("items")
                        .map(SchemaNode::from_value)
                        .unwrap_or(SchemaNode::Any),
                ),
            },
            Some("string") => SchemaNode::String {
                enum_values,
                format: obj.get("format").and_then(Value::as_str).map(str::to_string),
            },
            Some(k @ ("integer" | "number")) => SchemaNode::Number {
                integer: k == "integer",
                minimum: obj.get("minimum").and_then(Value::as_f64),
                maximum: obj.get("maximum").and_then(Value::as_f64),
            },
            Some("boolean") => SchemaNode::Boolean,
            Some(other) => SchemaNode::Unknown {
                detail: format!("unsupported schema type '{}'", other),
            },
            None => SchemaNode::Any,
        }
    }
}

/// Explicit `type`, or one inferred from `properties` / `items`.
/// OpenAPI 3.1 type arrays pick their first non-null entry.
fn schema_type(obj: &Map<String, Value>) -> Option<&str> {
    match obj.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ if obj.contains_key("properties") => Some("object"),
        _ if obj.contains_key("items") => Some("array"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// Status code as written in the document, e.g. `200` or `default`.
    pub status: String,
    pub description: String,
    pub schema: Option<SchemaNode>,
}

impl ResponseSpec {
    pub fn new(status: impl Into<String>, description: impl Into<String>, schema: Option<SchemaNode>) -> Self {
        Self {
            status: status.into(),
            description: description.into(),
            schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub path: String,
    pub method: HttpMethod,
    pub responses: Vec<ResponseSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    pub path: String,
    pub routes: Vec<RouteDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct SpecDocument {
    pub paths: Vec<PathItem>,
    /// Keyed by the JSON pointer a `$ref` uses, e.g. `#/components/schemas/Pet`.
    pub components: HashMap<String, SchemaNode>,
}

impl SpecDocument {
    pub async fn load(path: &Path) -> Result<Self, SpecError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SpecError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let yaml_hint = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        Self::parse(&text, yaml_hint)
    }

    pub fn parse(text: &str, yaml_hint: bool) -> Result<Self, SpecError> {
        let root = if yaml_hint {
            parse_yaml(text)?
        } else {
            match serde_json::from_str::<Value>(text) {
                Ok(value) => value,
                Err(json_err) => parse_yaml(text).map_err(|yaml_err| {
                    SpecError::Parse(format!("not JSON ({}) nor YAML ({})", json_err, yaml_err))
                })?,
            }
        };
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> Result<Self, SpecError> {
        let root_obj = root
            .as_object()
            .ok_or_else(|| SpecError::Parse("document root is not an object".to_string()))?;
        let paths = root_obj
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| SpecError::Parse("document has no 'paths' object".to_string()))?;

        let mut components = HashMap::new();
        if let Some(sections) = root_obj.get("components").and_then(Value::as_object) {
            for (section, entries) in sections {
                if let Some(entries) = entries.as_object() {
                    for (name, schema) in entries {
                        let key = format!("#/components/{}/{}", escape_pointer(section), escape_pointer(name));
                        components.insert(key, SchemaNode::from_value(schema));
                    }
                }
            }
        }
        if let Some(definitions) = root_obj.get("definitions").and_then(Value::as_object) {
            for (name, schema) in definitions {
                let key = format!("#/definitions/{}", escape_pointer(name));
                components.insert(key, SchemaNode::from_value(schema));
            }
        }

        let mut items = Vec::with_capacity(paths.len());
        for (path, path_item) in paths {
            let Some(path_item) = path_item.as_object() else {
                debug!(path = %path, "Skipping path item that is not an object");
                continue;
            };

            let mut routes = Vec::new();
            for (key, operation) in path_item {
                let method = match key.parse::<HttpMethod>() {
                    Ok(method) => method,
                    Err(_) => {
                        debug!(path = %path, key = %key, "Skipping non-method path item key");
                        continue;
                    }
                };
                routes.push(RouteDefinition {
                    path: path.clone(),
                    method,
                    responses: parse_responses(root, operation),
                });
            }

            items.push(PathItem {
                path: path.clone(),
                routes,
            });
        }

        Ok(Self {
            paths: items,
            components,
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.paths.iter().flat_map(|item| item.routes.iter())
    }
}

fn parse_responses(root: &Value, operation: &Value) -> Vec<ResponseSpec> {
    let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
        return Vec::new();
    };

    responses
        .iter()
        .map(|(status, response)| {
            // response objects may themselves be references into components/responses
            let response = match response.get("$ref").and_then(Value::as_str) {
                Some(target) => lookup_pointer(root, target).unwrap_or(response),
                None => response,
            };

            let description = response
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();

            ResponseSpec {
                status: status.clone(),
                description,
                schema: response_schema(response).map(SchemaNode::from_value),
            }
        })
        .collect()
}

fn response_schema(response: &Value) -> Option<&Value> {
    if let Some(content) = response.get("content").and_then(Value::as_object) {
        let json = mime::APPLICATION_JSON.essence_str();
        return content
            .get(json)
            .and_then(|media| media.get("schema"))
            .or_else(|| {
                content
                    .iter()
                    .filter(|(media_type, _)| media_type.contains("json"))
                    .find_map(|(_, media)| media.get("schema"))
            })
            .or_else(|| content.values().find_map(|media| media.get("schema")));
    }
    response.get("schema")
}

fn lookup_pointer<'a>(root: &'a Value, target: &str) -> Option<&'a Value> {
    target.strip_prefix('#').and_then(|pointer| root.pointer(pointer))
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn parse_yaml(text: &str) -> Result<Value, SpecError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| SpecError::Parse(e.to_string()))?;
    Ok(yaml_to_json(yaml))
}

/// YAML allows non-string mapping keys (`200:`); JSON does not, so keys are
/// stringified on the way through.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut out = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                out.insert(key, yaml_to_json(value));
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}
