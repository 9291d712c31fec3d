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

//! Maps an API path and method onto a deterministic directory under the mock root.
//!
//! `/pets/{petId}` + `GET` becomes `<root>/pets/{petId}/GET`. Literal segments are
//! sanitized, parameter segments are kept verbatim.

use crate::spec::HttpMethod;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Prefix owned by the management API; never a mock path.
pub const RESERVED_PREFIX: &str = "/_mock";

pub const MAX_SEGMENT_LEN: usize = 100;

static PARAM_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{[A-Za-z_][A-Za-z0-9_.\-]*\}$").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static ILLEGAL_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-_]").expect("valid regex"));
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path '{0}' uses the reserved management prefix {RESERVED_PREFIX}/")]
pub struct ReservedPrefix(pub String);

pub fn is_param_segment(segment: &str) -> bool {
    PARAM_SEGMENT.is_match(segment)
}

/// Lowercases and strips a segment down to `[a-z0-9-_]`, at most 100 characters.
///
/// Idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(input: &str) -> String {
    let lowered = input.to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(&lowered, "-");
    let legal = ILLEGAL_CHAR.replace_all(&hyphenated, "-");
    let collapsed = HYPHEN_RUN.replace_all(&legal, "-");

    let mut out: String = collapsed.trim_matches('-').to_string();
    if out.len() > MAX_SEGMENT_LEN {
        // only ASCII survives the replacement above, so byte truncation is safe
        out.truncate(MAX_SEGMENT_LEN);
        out = out.trim_end_matches('-').to_string();
    }
    out
}

pub fn is_reserved(api_path: &str) -> bool {
    let trimmed = api_path.trim();
    let normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    normalized == RESERVED_PREFIX || normalized.starts_with(&format!("{}/", RESERVED_PREFIX))
}

/// Directory-relative segments for an API path. Empty segments are dropped.
pub fn path_segments(api_path: &str) -> Vec<String> {
    api_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            if is_param_segment(segment) {
                Some(segment.to_string())
            } else {
                let clean = sanitize(segment);
                (!clean.is_empty()).then_some(clean)
            }
        })
        .collect()
}

pub fn map_to_directory(
    output_root: &Path,
    api_path: &str,
    method: HttpMethod,
) -> Result<PathBuf, ReservedPrefix> {
    if is_reserved(api_path) {
        return Err(ReservedPrefix(api_path.to_string()));
    }

    let mut dir = output_root.to_path_buf();
    for segment in path_segments(api_path) {
        dir.push(segment);
    }
    dir.push(method.as_str());
    Ok(dir)
}

/// Inverse of [`map_to_directory`]: recovers the (sanitized) path template and
/// method from an endpoint directory. `None` when the directory is not an
/// endpoint directory under `output_root`.
pub fn template_from_directory(output_root: &Path, dir: &Path) -> Option<(String, HttpMethod)> {
    let relative = dir.strip_prefix(output_root).ok()?;
    let mut segments: Vec<String> = relative
        .components()
        .map(|component| match component {
            Component::Normal(name) => name.to_str().map(str::to_string),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    let method_segment = segments.pop()?;
    if method_segment != method_segment.to_uppercase() {
        return None;
    }
    let method: HttpMethod = method_segment.parse().ok()?;

    Some((format!("/{}", segments.join("/")), method))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize("Users"), "users");
        assert_eq!(sanitize("  Pet   Store  "), "pet-store");
        assert_eq!(sanitize("a.b:c"), "a-b-c");
        assert_eq!(sanitize("--x--y--"), "x-y");
        assert_eq!(sanitize("snake_case"), "snake_case");
        assert_eq!(sanitize("Unexpected error"), "unexpected-error");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(150);
        assert_eq!(sanitize(&long).len(), MAX_SEGMENT_LEN);

        // truncation landing on a hyphen must not leave a trailing hyphen
        let tricky = format!("{}-{}", "b".repeat(99), "c".repeat(10));
        let once = sanitize(&tricky);
        assert_eq!(once, "b".repeat(99));
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_sanitize_idempotent() {
        let samples = [
            "",
            "Hello World",
            "../etc/passwd",
            "ÄÖÜ straße",
            "   ",
            "a--b__c",
            "Tab\tSeparated\nLines",
            "x*?|<>\"y",
            &"ab-".repeat(60),
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_param_segments_pass_through() {
        assert!(is_param_segment("{petId}"));
        assert!(is_param_segment("{pet_id}"));
        assert!(!is_param_segment("{}"));
        assert!(!is_param_segment("pet{Id}"));
        assert_eq!(path_segments("/pets/{petId}/Photos"), vec!["pets", "{petId}", "photos"]);
    }

    #[test]
    fn test_map_to_directory() {
        let root = Path::new("/tmp/mocks");
        let dir = map_to_directory(root, "/pets/{petId}", HttpMethod::Get).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/mocks/pets/{petId}/GET"));

        let dir = map_to_directory(root, "//Users//", HttpMethod::Post).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/mocks/users/POST"));

        let dir = map_to_directory(root, "/", HttpMethod::Options).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/mocks/OPTIONS"));
    }

    #[test]
    fn test_map_to_directory_is_deterministic() {
        let root = Path::new("mocks");
        let a = map_to_directory(root, "/Orders/{id}/Items", HttpMethod::Delete).unwrap();
        let b = map_to_directory(root, "/Orders/{id}/Items", HttpMethod::Delete).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        let root = Path::new("mocks");
        assert!(map_to_directory(root, "/_mock/x", HttpMethod::Get).is_err());
        assert!(map_to_directory(root, "/_mock", HttpMethod::Get).is_err());
        assert!(map_to_directory(root, "_mock/endpoints", HttpMethod::Get).is_err());
        assert!(map_to_directory(root, "/_mockery", HttpMethod::Get).is_ok());
    }

    #[test]
    fn test_template_from_directory() {
        let root = Path::new("mocks");
        let dir = map_to_directory(root, "/pets/{petId}", HttpMethod::Get).unwrap();
        assert_eq!(
            template_from_directory(root, &dir),
            Some(("/pets/{petId}".to_string(), HttpMethod::Get))
        );
        assert_eq!(
            template_from_directory(root, Path::new("mocks/GET")),
            Some(("/".to_string(), HttpMethod::Get))
        );
        assert_eq!(template_from_directory(root, Path::new("mocks/pets")), None);
        assert_eq!(template_from_directory(root, Path::new("elsewhere/GET")), None);
    }
}
