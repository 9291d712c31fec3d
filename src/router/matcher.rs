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

use crate::router::RuntimeEndpoint;
use crate::spec::HttpMethod;
use crate::storage::layout::{is_param_segment, sanitize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Literal(String),
    Param(String),
}

/// A registered path such as `/pets/{petId}`, split into segments.
///
/// Literal segments are stored sanitized, the same way the endpoint directory
/// names them, so a template recovered from disk and one registered with the
/// original spelling behave the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<TemplateSegment>,
}

impl PathTemplate {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .filter_map(|segment| {
                if is_param_segment(segment) {
                    let name = segment.trim_start_matches('{').trim_end_matches('}');
                    Some(TemplateSegment::Param(name.to_string()))
                } else {
                    let clean = sanitize(segment);
                    (!clean.is_empty()).then_some(TemplateSegment::Literal(clean))
                }
            })
            .collect();
        Self { segments }
    }

    /// Segment-by-segment match; a `{name}` segment takes any single segment.
    /// Returns the captured parameters on success.
    pub fn matches(&self, request_segments: &[&str]) -> Option<HashMap<String, String>> {
        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(request_segments) {
            match segment {
                TemplateSegment::Literal(lit) => {
                    if *lit != sanitize(actual) {
                        return None;
                    }
                }
                TemplateSegment::Param(name) => {
                    params.insert(name.clone(), actual.to_string());
                }
            }
        }
        Some(params)
    }

    /// Literal segments rank above parameters, position by position.
    fn specificity(&self) -> Vec<bool> {
        self.segments
            .iter()
            .map(|s| matches!(s, TemplateSegment::Literal(_)))
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct EndpointMatcher {
    endpoints: Vec<(PathTemplate, Arc<RuntimeEndpoint>)>,
}

impl EndpointMatcher {
    pub fn new(endpoints: Vec<Arc<RuntimeEndpoint>>) -> Self {
        let mut endpoints: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| (PathTemplate::parse(&endpoint.path), endpoint))
            .collect();

        // Most specific first; among equals, longer paths first.
        endpoints.sort_by(|(a, ea), (b, eb)| {
            b.specificity()
                .cmp(&a.specificity())
                .then_with(|| eb.path.len().cmp(&ea.path.len()))
        });

        Self { endpoints }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<RuntimeEndpoint>> {
        self.endpoints.iter().map(|(_, endpoint)| endpoint)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn normalize_path(path: &str) -> String {
        let mut normalized = String::new();
        let mut last_was_slash = false;

        for c in path.chars() {
            if c == '/' {
                if !last_was_slash {
                    normalized.push(c);
                    last_was_slash = true;
                }
            } else {
                normalized.push(c);
                last_was_slash = false;
            }
        }

        if normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }

        if normalized.is_empty() {
            "/".to_string()
        } else {
            normalized
        }
    }

    pub fn find_match(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Option<(Arc<RuntimeEndpoint>, HashMap<String, String>)> {
        let normalized = Self::normalize_path(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        self.endpoints
            .iter()
            .filter(|(_, endpoint)| endpoint.method == method)
            .find_map(|(template, endpoint)| {
                template
                    .matches(&segments)
                    .map(|params| (endpoint.clone(), params))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn endpoint(method: HttpMethod, path: &str) -> Arc<RuntimeEndpoint> {
        Arc::new(RuntimeEndpoint {
            path: path.to_string(),
            method,
            directory: PathBuf::from(format!("mocks{}/{}", path, method)),
        })
    }

    #[test]
    fn test_find_match_exact_path() {
        let matcher = EndpointMatcher::new(vec![
            endpoint(HttpMethod::Get, "/api/users"),
            endpoint(HttpMethod::Post, "/api/users"),
        ]);

        let (found, _) = matcher.find_match(HttpMethod::Get, "/api/users").unwrap();
        assert_eq!(found.method, HttpMethod::Get);

        let (found, _) = matcher.find_match(HttpMethod::Post, "/api/users").unwrap();
        assert_eq!(found.method, HttpMethod::Post);

        assert!(matcher.find_match(HttpMethod::Delete, "/api/users").is_none());
    }

    #[test]
    fn test_find_match_with_params() {
        let matcher = EndpointMatcher::new(vec![endpoint(HttpMethod::Get, "/users/{id}/posts/{postId}")]);

        let (found, params) = matcher.find_match(HttpMethod::Get, "/users/123/posts/456").unwrap();
        assert_eq!(found.path, "/users/{id}/posts/{postId}");
        assert_eq!(params.get("id"), Some(&"123".to_string()));
        assert_eq!(params.get("postId"), Some(&"456".to_string()));

        assert!(matcher.find_match(HttpMethod::Get, "/users/123/posts").is_none());
        assert!(matcher.find_match(HttpMethod::Get, "/users/123/posts/456/x").is_none());
    }

    #[test]
    fn test_find_match_no_match() {
        let matcher = EndpointMatcher::new(vec![endpoint(HttpMethod::Get, "/api/users")]);
        assert!(matcher.find_match(HttpMethod::Get, "/api/products").is_none());
    }

    #[test]
    fn test_find_match_trailing_and_duplicate_slashes() {
        let matcher = EndpointMatcher::new(vec![endpoint(HttpMethod::Get, "/api/users")]);
        assert!(matcher.find_match(HttpMethod::Get, "/api/users/").is_some());
        assert!(matcher.find_match(HttpMethod::Get, "//api///users").is_some());
    }

    #[test]
    fn test_literal_beats_param() {
        let matcher = EndpointMatcher::new(vec![
            endpoint(HttpMethod::Get, "/users/{id}"),
            endpoint(HttpMethod::Get, "/users/me"),
        ]);

        let (found, _) = matcher.find_match(HttpMethod::Get, "/users/me").unwrap();
        assert_eq!(found.path, "/users/me");

        let (found, _) = matcher.find_match(HttpMethod::Get, "/users/42").unwrap();
        assert_eq!(found.path, "/users/{id}");
    }

    #[test]
    fn test_literal_segments_compare_sanitized() {
        let matcher = EndpointMatcher::new(vec![endpoint(HttpMethod::Get, "/Pet Store/items")]);
        assert!(matcher.find_match(HttpMethod::Get, "/pet-store/items").is_some());
        assert!(matcher.find_match(HttpMethod::Get, "/PET-STORE/items").is_some());
    }

    #[test]
    fn test_root_path() {
        let matcher = EndpointMatcher::new(vec![endpoint(HttpMethod::Get, "/")]);
        assert!(matcher.find_match(HttpMethod::Get, "/").is_some());
        assert!(matcher.find_match(HttpMethod::Get, "").is_some());
        assert!(matcher.find_match(HttpMethod::Get, "/x").is_none());
    }
}
