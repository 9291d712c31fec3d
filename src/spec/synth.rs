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

//! Deterministic mock values from schema nodes.
//!
//! No randomness is involved: the same schema always produces the same value,
//! so regenerated mock trees diff cleanly.

use crate::spec::document::{SchemaNode, SpecDocument};
use crate::spec::resolver::{Diagnostic, DiagnosticKind, DiagnosticSink, SchemaResolver, VisitedRefs};
use serde_json::{Map, Value};

pub const DATE_TIME_EXAMPLE: &str = "2023-01-01T00:00:00Z";
pub const DATE_EXAMPLE: &str = "2023-01-01";
pub const EMAIL_EXAMPLE: &str = "user@example.com";
pub const URI_EXAMPLE: &str = "https://example.com";
pub const UUID_EXAMPLE: &str = "123e4567-e89b-12d3-a456-426614174000";

fn format_example(format: &str) -> Option<&'static str> {
    match format {
        "date-time" => Some(DATE_TIME_EXAMPLE),
        "date" => Some(DATE_EXAMPLE),
        "email" => Some(EMAIL_EXAMPLE),
        "uri" => Some(URI_EXAMPLE),
        "uuid" => Some(UUID_EXAMPLE),
        _ => None,
    }
}

pub struct MockSynthesizer<'a> {
    resolver: SchemaResolver<'a>,
}

impl<'a> MockSynthesizer<'a> {
    pub fn new(document: &'a SpecDocument, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            resolver: SchemaResolver::new(document, sink),
        }
    }

    pub fn synthesize(&self, node: &SchemaNode) -> Value {
        let mut visited = VisitedRefs::default();
        self.walk(node, &mut visited)
    }

    fn walk(&self, node: &SchemaNode, visited: &mut VisitedRefs) -> Value {
        match node {
            SchemaNode::Ref { .. } => {
                let mark = visited.mark();
                let value = match self.resolver.resolve(node, visited) {
                    Some(concrete) => self.walk(concrete, visited),
                    None => Value::Null,
                };
                visited.rewind(mark);
                value
            }
            SchemaNode::Literal { example } => example.clone(),
            SchemaNode::Object { properties } => {
                let mut out = Map::with_capacity(properties.len());
                for (name, schema) in properties {
                    out.insert(name.clone(), self.walk(schema, visited));
                }
                Value::Object(out)
            }
            SchemaNode::Array { items } => Value::Array(vec![self.walk(items, visited)]),
            SchemaNode::String {
                enum_values,
                format,
            } => {
                if let Some(first) = enum_values.first() {
                    first.clone()
                } else if let Some(example) = format.as_deref().and_then(format_example) {
                    Value::String(example.to_string())
                } else {
                    Value::String("string".to_string())
                }
            }
            SchemaNode::Number {
                integer,
                minimum,
                maximum,
            } => match (minimum, maximum) {
                (Some(min), _) => number_value(*min, *integer),
                (None, Some(max)) => number_value((max / 2.0).floor(), *integer),
                (None, None) => Value::from(0),
            },
            SchemaNode::Boolean => Value::Bool(true),
            SchemaNode::AllOf(members) => self.merge_all_of(members, visited),
            SchemaNode::OneOf(members) => members
                .first()
                .map(|first| self.walk(first, visited))
                .unwrap_or(Value::Null),
            SchemaNode::Any => Value::Null,
            SchemaNode::Unknown { detail } => {
                self.resolver.sink().report(Diagnostic {
                    kind: DiagnosticKind::UnsupportedSchema,
                    reference: String::new(),
                    message: format!("{}, using null", detail),
                });
                Value::Null
            }
        }
    }

    /// Object members are merged left to right; if no member yields an object,
    /// the first member's value is used as-is.
    fn merge_all_of(&self, members: &[SchemaNode], visited: &mut VisitedRefs) -> Value {
        let values: Vec<Value> = members.iter().map(|m| self.walk(m, visited)).collect();

        let mut merged: Option<Map<String, Value>> = None;
        for value in &values {
            if let Value::Object(fields) = value {
                merged
                    .get_or_insert_with(Map::new)
                    .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        match merged {
            Some(fields) => Value::Object(fields),
            None => values.into_iter().next().unwrap_or(Value::Null),
        }
    }
}

/// Whole numbers are emitted as JSON integers even for `number` schemas.
fn number_value(n: f64, integer: bool) -> Value {
    if integer || (n.fract() == 0.0 && n.abs() < i64::MAX as f64) {
        Value::from(n.ceil() as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::from(0))
    }
}
