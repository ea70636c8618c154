//! Resolution context: the per-request memo and cycle-detection state

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attribute::{Attribute, AttributeValue};

use super::plugin::{Dependency, PluginId};

/// The request a resolution is performed for.
///
/// Immutable for the lifetime of one [`ResolutionContext`]; activation
/// conditions and connector sources read it, nothing writes it.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// Authenticated principal name
    pub principal: String,
    /// Requesting relying party (entity id / service URL)
    pub relying_party: String,
}

impl ResolutionRequest {
    /// Create a request for a principal and relying party
    pub fn new(principal: impl Into<String>, relying_party: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            relying_party: relying_party.into(),
        }
    }
}

/// Memoized outcome of one attribute definition within one context.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionOutcome {
    /// Produced a non-empty attribute
    Resolved(Attribute),
    /// Legitimately produced nothing (no rows, no match, condition false)
    Empty,
    /// Resolution logic failed; dependents see a definitive failure
    Failed(String),
}

/// Memoized outcome of one data connector within one context.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorOutcome {
    /// Raw attributes keyed by name
    Resolved(HashMap<String, Attribute>),
    /// Source returned nothing and the connector tolerates that
    Empty,
    /// Source call failed (or returned nothing with no-result-is-error)
    Failed(String),
}

/// Raised by [`ResolutionContext::dependency_values`] when a source
/// plugin is recorded as failed.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyFailure {
    /// The failed source plugin
    pub source_id: PluginId,
    /// Its recorded failure reason
    pub reason: String,
}

/// Mutable, request-scoped container for resolved plugin results.
///
/// Created once per resolution request, never shared across requests,
/// discarded with the request. For any plugin id the memo tables
/// transition absent → present at most once; a repeated request for the
/// same id is always a memo hit, never a re-invocation.
#[derive(Debug)]
pub struct ResolutionContext {
    /// Correlation id for diagnostics
    pub id: Uuid,
    /// The request being resolved
    pub request: ResolutionRequest,
    /// When the context was created
    pub created_at: DateTime<Utc>,
    resolved_definitions: HashMap<PluginId, DefinitionOutcome>,
    resolved_connectors: HashMap<PluginId, ConnectorOutcome>,
    in_progress: Vec<PluginId>,
}

impl ResolutionContext {
    /// Create a fresh context for a request
    pub fn new(request: ResolutionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            created_at: Utc::now(),
            resolved_definitions: HashMap::new(),
            resolved_connectors: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    // --- Memo tables ---

    /// Memoized definition outcome, if any
    pub fn definition(&self, id: &PluginId) -> Option<&DefinitionOutcome> {
        self.resolved_definitions.get(id)
    }

    /// Memoized connector outcome, if any
    pub fn connector(&self, id: &PluginId) -> Option<&ConnectorOutcome> {
        self.resolved_connectors.get(id)
    }

    /// Record a definition outcome. First write wins; the engine never
    /// resolves the same plugin twice within a context.
    pub fn record_definition(&mut self, id: PluginId, outcome: DefinitionOutcome) {
        debug_assert!(
            !self.resolved_definitions.contains_key(&id),
            "definition {} resolved twice in one context",
            id
        );
        self.resolved_definitions.entry(id).or_insert(outcome);
    }

    /// Record a connector outcome. First write wins.
    pub fn record_connector(&mut self, id: PluginId, outcome: ConnectorOutcome) {
        debug_assert!(
            !self.resolved_connectors.contains_key(&id),
            "connector {} resolved twice in one context",
            id
        );
        self.resolved_connectors.entry(id).or_insert(outcome);
    }

    /// True if either memo table holds an entry for `id`
    pub fn is_resolved(&self, id: &PluginId) -> bool {
        self.resolved_definitions.contains_key(id) || self.resolved_connectors.contains_key(id)
    }

    // --- Cycle sentinel ---

    /// True if `id` is on the current resolution call stack
    pub fn is_in_progress(&self, id: &PluginId) -> bool {
        self.in_progress.contains(id)
    }

    /// Push a plugin onto the resolution stack
    pub fn push_in_progress(&mut self, id: PluginId) {
        self.in_progress.push(id);
    }

    /// Pop the most recently pushed plugin
    pub fn pop_in_progress(&mut self) {
        self.in_progress.pop();
    }

    /// The resolution stack from the first occurrence of `id` onward,
    /// with `id` appended — the cycle chain for diagnostics.
    pub fn cycle_chain(&self, id: &PluginId) -> Vec<PluginId> {
        let start = self
            .in_progress
            .iter()
            .position(|p| p == id)
            .unwrap_or(0);
        let mut chain: Vec<PluginId> = self.in_progress[start..].to_vec();
        chain.push(id.clone());
        chain
    }

    /// The current resolution stack (outermost first)
    pub fn resolution_chain(&self) -> &[PluginId] {
        &self.in_progress
    }

    // --- Dependency reads ---

    /// Collect the source values a definition's dependencies contribute,
    /// in declaration order.
    ///
    /// - A dependency on a definition pulls that definition's output
    ///   values (the `attribute_id` qualifier is redundant and ignored).
    /// - A dependency on a connector with `attribute_id` pulls that one
    ///   raw attribute; without it, every exposed raw attribute.
    /// - Empty outcomes and absent raw attributes contribute nothing.
    /// - A failed source aborts the collection with [`DependencyFailure`];
    ///   the caller decides whether that is fatal or default-substituted.
    pub fn dependency_values(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<AttributeValue>, DependencyFailure> {
        let mut values = Vec::new();
        for dep in dependencies {
            if let Some(outcome) = self.resolved_definitions.get(&dep.source_id) {
                match outcome {
                    DefinitionOutcome::Resolved(attr) => values.extend(attr.values.iter().cloned()),
                    DefinitionOutcome::Empty => {}
                    DefinitionOutcome::Failed(reason) => {
                        return Err(DependencyFailure {
                            source_id: dep.source_id.clone(),
                            reason: reason.clone(),
                        })
                    }
                }
                continue;
            }
            if let Some(outcome) = self.resolved_connectors.get(&dep.source_id) {
                match outcome {
                    ConnectorOutcome::Resolved(attrs) => match &dep.attribute_id {
                        Some(name) => {
                            if let Some(attr) = attrs.get(name) {
                                values.extend(attr.values.iter().cloned());
                            }
                        }
                        None => {
                            // Deterministic order: sort raw names
                            let mut names: Vec<&String> = attrs.keys().collect();
                            names.sort();
                            for name in names {
                                values.extend(attrs[name].values.iter().cloned());
                            }
                        }
                    },
                    ConnectorOutcome::Empty => {}
                    ConnectorOutcome::Failed(reason) => {
                        return Err(DependencyFailure {
                            source_id: dep.source_id.clone(),
                            reason: reason.clone(),
                        })
                    }
                }
            }
            // An unrecorded source at this point is a skipped/inactive
            // plugin; it contributes nothing.
        }
        Ok(values)
    }

    // --- Output assembly ---

    /// Assemble the externally visible attribute set for the requested
    /// plugin ids: the union of resolved definition outputs plus the raw
    /// exports of any connector that was itself requested.
    ///
    /// Colliding output ids resolve last-in-request-order wins, with a
    /// warning diagnostic; ordering was historically deployment-controlled
    /// so this is not a hard failure. A plugin id repeated in `requested`
    /// is processed once and is not a collision.
    pub fn exported_attributes(&self, requested: &[PluginId]) -> HashMap<String, Attribute> {
        let mut exported: HashMap<String, Attribute> = HashMap::new();
        let mut insert = |attr: &Attribute| {
            if exported.contains_key(&attr.id) {
                tracing::warn!(
                    attribute = %attr.id,
                    context = %self.id,
                    "colliding output attribute id; last resolved wins"
                );
            }
            exported.insert(attr.id.clone(), attr.clone());
        };

        let mut seen: HashSet<&PluginId> = HashSet::new();
        for id in requested {
            if !seen.insert(id) {
                continue;
            }
            if let Some(DefinitionOutcome::Resolved(attr)) = self.resolved_definitions.get(id) {
                insert(attr);
            }
            if let Some(ConnectorOutcome::Resolved(attrs)) = self.resolved_connectors.get(id) {
                let mut names: Vec<&String> = attrs.keys().collect();
                names.sort();
                for name in names {
                    insert(&attrs[name]);
                }
            }
        }
        exported
    }
}
