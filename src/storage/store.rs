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

use crate::spec::HttpMethod;
use crate::storage::layout;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub const STATUS_FILE: &str = "status.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

/// File-system capability rooted at the mock output directory.
///
/// Every JSON write goes to a uniquely named temp file first and is renamed into
/// place, so concurrent readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct MockStore {
    root: PathBuf,
}

impl MockStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read_text(&self, path: &Path) -> Result<String, StorageError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let text = self.read_text(path).await?;
        serde_json::from_str(&text).map_err(|source| StorageError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }

        let payload = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|e| StorageError::io(&temp_path, e))?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::io(path, e));
        }

        debug!(path = %path.display(), "Wrote JSON file");
        Ok(())
    }

    pub async fn ensure_dir(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    pub async fn path_exists(&self, path: &Path) -> Result<bool, StorageError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    /// Creates `path` (and its parents), returning `Ok(false)` when the
    /// leaf already exists. The leaf creation is a single `mkdir`, so exactly one
    /// of several racing callers observes `Ok(true)`.
    pub async fn create_dir_exclusive(&self, path: &Path) -> Result<bool, StorageError> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }

        match tokio::fs::create_dir(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    pub async fn remove_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    /// Response file names in `dir`, sorted, excluding the status descriptor.
    pub async fn list_response_files(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(dir, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.ends_with(".json") && name != STATUS_FILE && entry.path().is_file() {
                files.push(name);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Walks the whole tree and returns every endpoint directory with the path
    /// template and method it encodes.
    pub async fn scan_endpoints(&self) -> Result<Vec<(String, HttpMethod, PathBuf)>, StorageError> {
        let mut found = Vec::new();
        if !self.path_exists(&self.root).await? {
            return Ok(found);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(&dir, e))?
            {
                let path = entry.path();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    continue;
                }

                if let Some((template, method)) = layout::template_from_directory(&self.root, &path) {
                    if !self.list_response_files(&path).await?.is_empty() {
                        found.push((template, method, path.clone()));
                    }
                }
                pending.push(path);
            }
        }

        found.sort_by(|a, b| a.2.cmp(&b.2));
        Ok(found)
    }
}
