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

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    #[schema(example = "GET")]
    pub method: String,
    #[schema(example = "/pets/42")]
    pub path: String,
    #[schema(example = 200)]
    pub status: u16,
    #[schema(value_type = String, example = "2026-01-01T00:00:00Z")]
    pub timestamp: DateTime<Utc>,
    #[schema(example = 51)]
    pub duration_ms: u64,
    /// Directory of the endpoint that answered, absent for unmatched requests.
    pub endpoint: Option<String>,
}

/// Per-endpoint request counters plus a bounded log of recent requests.
///
/// Counters are keyed by endpoint directory, so they survive the endpoint table
/// being rebuilt from storage.
#[derive(Clone)]
pub struct RequestStats {
    counters: Arc<DashMap<String, u64>>,
    events: Arc<Mutex<VecDeque<RequestEvent>>>,
    capacity: usize,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    pub fn increment_count(&self, key: &str) -> u64 {
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get_count(&self, key: &str) -> u64 {
        self.counters.get(key).map(|entry| *entry).unwrap_or(0)
    }

    pub fn record(&self, event: RequestEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<RequestEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}
