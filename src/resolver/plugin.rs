//! Plugin identity, dependency edges, and the shared lifecycle base

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::ResolutionRequest;
use super::engine::{ResolveError, ResolveResult};

/// Unique identifier for a plugin within a resolver graph
///
/// Serializes as a plain string (e.g. "eduPersonAffiliation" or "ldap1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    /// Create a PluginId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A typed edge from a dependent plugin to one of its sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The plugin this dependency points at
    pub source_id: PluginId,
    /// For connector sources: a specific raw attribute to pull.
    /// `None` means "everything the connector exposes" (or, for a
    /// definition source, its single output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<String>,
}

impl Dependency {
    /// Depend on everything a source exposes
    pub fn on(source_id: impl Into<PluginId>) -> Self {
        Self {
            source_id: source_id.into(),
            attribute_id: None,
        }
    }

    /// Depend on one named raw attribute of a connector
    pub fn on_attribute(source_id: impl Into<PluginId>, attribute_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            attribute_id: Some(attribute_id.into()),
        }
    }
}

/// Predicate deciding whether a plugin participates in a given request.
///
/// A false condition records the plugin as resolved-empty: dependents see
/// it contributing nothing, never as failed.
#[derive(Clone, Default)]
pub enum ActivationCondition {
    /// Always active
    #[default]
    Always,
    /// Active only for the named relying party
    RequesterIs(String),
    /// Arbitrary caller-supplied predicate
    Predicate(Arc<dyn Fn(&ResolutionRequest) -> bool + Send + Sync>),
}

impl ActivationCondition {
    /// Evaluate the condition against a request
    pub fn applies(&self, request: &ResolutionRequest) -> bool {
        match self {
            Self::Always => true,
            Self::RequesterIs(rp) => request.relying_party == *rp,
            Self::Predicate(p) => p(request),
        }
    }
}

impl std::fmt::Debug for ActivationCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::RequesterIs(rp) => write!(f, "RequesterIs({:?})", rp),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Lifecycle of a plugin instance shared across requests.
///
/// Monotonic: there is no path back from `Destroyed`, and no path back
/// from `Initialized` except destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Constructed, nothing set yet
    #[default]
    Unconfigured,
    /// Dependencies/rules applied, not yet validated
    Configured,
    /// Validated and locked; the only state in which `resolve()` is legal
    Initialized,
    /// Terminal; every further use is an error
    Destroyed,
}

/// Configuration and lifecycle state shared by every plugin kind.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Unique id within the graph
    pub id: PluginId,
    /// Ordered outgoing dependency edges
    pub dependencies: Vec<Dependency>,
    /// Request-scoped activation gate
    pub activation_condition: ActivationCondition,
    /// When true, a resolution failure of this plugin aborts the whole
    /// request; when false, the plugin is simply absent from the output.
    pub fail_fast: bool,
    state: LifecycleState,
}

impl PluginConfig {
    /// Create an unconfigured plugin base
    pub fn new(id: impl Into<PluginId>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            activation_condition: ActivationCondition::Always,
            fail_fast: false,
            state: LifecycleState::Unconfigured,
        }
    }

    /// Add a dependency edge (builder style)
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self.state = LifecycleState::Configured;
        self
    }

    /// Set the activation condition
    pub fn with_activation(mut self, condition: ActivationCondition) -> Self {
        self.activation_condition = condition;
        self.state = LifecycleState::Configured;
        self
    }

    /// Set the fatality policy
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Validate and lock the plugin.
    ///
    /// Rejects an empty id, a destroyed instance, and double
    /// initialization.
    pub fn initialize(&mut self) -> ResolveResult<()> {
        match self.state {
            LifecycleState::Destroyed => return Err(ResolveError::Destroyed(self.id.clone())),
            LifecycleState::Initialized => {
                return Err(ResolveError::MissingConfiguration {
                    id: self.id.clone(),
                    detail: "already initialized".to_string(),
                })
            }
            LifecycleState::Unconfigured | LifecycleState::Configured => {}
        }
        if self.id.as_str().trim().is_empty() {
            return Err(ResolveError::MissingConfiguration {
                id: self.id.clone(),
                detail: "empty plugin id".to_string(),
            });
        }
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Verify the plugin is in a state where `resolve()` is legal
    pub fn ensure_usable(&self) -> ResolveResult<()> {
        match self.state {
            LifecycleState::Initialized => Ok(()),
            LifecycleState::Destroyed => Err(ResolveError::Destroyed(self.id.clone())),
            _ => Err(ResolveError::NotInitialized(self.id.clone())),
        }
    }

    /// Tear the plugin down. Terminal; `initialize()` and `resolve()`
    /// after this always fail.
    pub fn destroy(&mut self) {
        self.state = LifecycleState::Destroyed;
    }
}
