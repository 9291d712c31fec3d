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

use crate::spec::document::{SchemaNode, SpecDocument};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnresolvedRef,
    CyclicRef,
    UnsupportedSchema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub reference: String,
    pub message: String,
}

/// Receives non-fatal schema problems. Generation never stops because of them.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::CyclicRef => debug!(
                reference = %diagnostic.reference,
                "{}", diagnostic.message
            ),
            _ => warn!(
                kind = ?diagnostic.kind,
                reference = %diagnostic.reference,
                "{}", diagnostic.message
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .map(|mut entries| std::mem::take(&mut *entries))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(diagnostic);
        }
    }
}

/// Reports to two sinks; the pipeline uses it to both log and count.
pub struct TeeSink<'a>(pub &'a dyn DiagnosticSink, pub &'a dyn DiagnosticSink);

impl DiagnosticSink for TeeSink<'_> {
    fn report(&self, diagnostic: Diagnostic) {
        self.0.report(diagnostic.clone());
        self.1.report(diagnostic);
    }
}

/// Reference targets entered on the current resolution path.
#[derive(Debug, Default)]
pub struct VisitedRefs {
    path: Vec<String>,
}

impl VisitedRefs {
    pub fn contains(&self, target: &str) -> bool {
        self.path.iter().any(|t| t == target)
    }

    pub fn mark(&self) -> usize {
        self.path.len()
    }

    pub fn rewind(&mut self, mark: usize) {
        self.path.truncate(mark);
    }

    fn enter(&mut self, target: &str) {
        self.path.push(target.to_string());
    }
}

pub struct SchemaResolver<'a> {
    document: &'a SpecDocument,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(document: &'a SpecDocument, sink: &'a dyn DiagnosticSink) -> Self {
        Self { document, sink }
    }

    pub fn sink(&self) -> &'a dyn DiagnosticSink {
        self.sink
    }

    /// Follows `node` through any chain of references to a concrete node.
    ///
    /// Every target entered is pushed onto `visited`; callers rewind to their
    /// own mark once the concrete node has been walked. `None` means the branch
    /// ends in null: either the target is missing or it is already on the path.
    pub fn resolve<'n>(&self, node: &'n SchemaNode, visited: &mut VisitedRefs) -> Option<&'n SchemaNode>
    where
        'a: 'n,
    {
        let mut current = node;
        while let SchemaNode::Ref { target } = current {
            if visited.contains(target) {
                self.sink.report(Diagnostic {
                    kind: DiagnosticKind::CyclicRef,
                    reference: target.clone(),
                    message: format!("cyclic reference {} truncated to null", target),
                });
                return None;
            }

            match self.document.components.get(target) {
                Some(next) => {
                    visited.enter(target);
                    current = next;
                }
                None => {
                    self.sink.report(Diagnostic {
                        kind: DiagnosticKind::UnresolvedRef,
                        reference: target.clone(),
                        message: format!("unresolvable reference {}, using null", target),
                    });
                    return None;
                }
            }
        }
        Some(current)
    }
}
