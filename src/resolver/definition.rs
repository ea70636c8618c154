//! Attribute definitions: plugins that compute one named output attribute

use regex::Regex;
use tracing::debug;

use crate::attribute::{Attribute, AttributeValue};
use crate::transform::{attach_scope, TransformError, ValueMap};

use super::context::{DefinitionOutcome, ResolutionContext};
use super::engine::{ResolveError, ResolveResult};
use super::plugin::{ActivationCondition, Dependency, LifecycleState, PluginConfig, PluginId};

/// The closed family of definition kinds.
#[derive(Debug, Clone)]
pub enum DefinitionKind {
    /// Dependency values pass through the kind stage unchanged
    Simple,
    /// Each string value is qualified with a static scope
    Scoped { scope: String },
    /// Capture group 1 of the pattern, applied to each string value;
    /// non-matching values contribute nothing
    RegexSplit { pattern: String },
}

/// A plugin producing one named attribute from dependency data plus
/// declarative transforms.
///
/// Pipeline per request: gather dependency values → kind transform →
/// value map (first-match-wins rules, pass-through) → default value if
/// the output is still empty.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    config: PluginConfig,
    kind: DefinitionKind,
    value_map: Option<ValueMap>,
    default_value: Option<String>,
    // Compiled at initialize() so a bad pattern is a configuration
    // error, not a per-request failure.
    split_regex: Option<Regex>,
}

impl AttributeDefinition {
    /// A definition that emits its dependency values unchanged
    pub fn simple(id: impl Into<PluginId>) -> Self {
        Self::with_kind(id, DefinitionKind::Simple)
    }

    /// A definition that scopes each value with `scope`
    pub fn scoped(id: impl Into<PluginId>, scope: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            DefinitionKind::Scoped {
                scope: scope.into(),
            },
        )
    }

    /// A definition extracting capture group 1 of `pattern` from each value
    pub fn regex_split(id: impl Into<PluginId>, pattern: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            DefinitionKind::RegexSplit {
                pattern: pattern.into(),
            },
        )
    }

    fn with_kind(id: impl Into<PluginId>, kind: DefinitionKind) -> Self {
        Self {
            config: PluginConfig::new(id),
            kind,
            value_map: None,
            default_value: None,
            split_regex: None,
        }
    }

    // --- Configuration (legal before initialize only) ---

    /// Add a dependency edge
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.config = self.config.with_dependency(dependency);
        self
    }

    /// Set the activation condition
    pub fn with_activation(mut self, condition: ActivationCondition) -> Self {
        self.config = self.config.with_activation(condition);
        self
    }

    /// Attach a value map (transform stage)
    pub fn with_value_map(mut self, value_map: ValueMap) -> Self {
        self.value_map = Some(value_map);
        self
    }

    /// Emit this value when the transform stages produce nothing
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Abort the whole request when this definition fails
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config = self.config.fail_fast(fail_fast);
        self
    }

    // --- Accessors ---

    /// Plugin id
    pub fn id(&self) -> &PluginId {
        &self.config.id
    }

    /// Declared dependencies, in order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.config.dependencies
    }

    /// Activation condition
    pub fn activation_condition(&self) -> &ActivationCondition {
        &self.config.activation_condition
    }

    /// Fatality policy
    pub fn is_fail_fast(&self) -> bool {
        self.config.fail_fast
    }

    /// Lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.config.state()
    }

    /// True when a default value is configured, which also makes the
    /// definition tolerant of failed dependencies.
    fn has_default(&self) -> bool {
        self.default_value.is_some()
            || self
                .value_map
                .as_ref()
                .is_some_and(|m| m.default_value.is_some())
    }

    // --- Lifecycle ---

    /// Validate configuration and lock the definition.
    ///
    /// Rejects an empty id, a definition with neither dependencies nor a
    /// default value, and unparseable patterns.
    pub fn initialize(&mut self) -> ResolveResult<()> {
        if self.config.state() == LifecycleState::Destroyed {
            return Err(ResolveError::Destroyed(self.config.id.clone()));
        }
        if self.config.dependencies.is_empty() && !self.has_default() {
            return Err(ResolveError::MissingConfiguration {
                id: self.config.id.clone(),
                detail: "definition needs at least one dependency or a default value".to_string(),
            });
        }
        if matches!(self.kind, DefinitionKind::Scoped { .. }) && self.value_map.is_some() {
            // Scoping runs before the value map, so every scoped value
            // would hit the map's string-only contract and fail.
            return Err(ResolveError::MissingConfiguration {
                id: self.config.id.clone(),
                detail: "a scoped definition cannot carry a value map; \
                         map values in an upstream definition instead"
                    .to_string(),
            });
        }
        if let DefinitionKind::RegexSplit { pattern } = &self.kind {
            self.split_regex = Some(Regex::new(pattern).map_err(|e| {
                ResolveError::MissingConfiguration {
                    id: self.config.id.clone(),
                    detail: format!("invalid split pattern '{}': {}", pattern, e),
                }
            })?);
        }
        if let Some(map) = &self.value_map {
            map.validate()
                .map_err(|e| ResolveError::MissingConfiguration {
                    id: self.config.id.clone(),
                    detail: e.to_string(),
                })?;
        }
        self.config.initialize()
    }

    /// Tear down; terminal
    pub fn destroy(&mut self) {
        self.config.destroy();
    }

    // --- Resolution ---

    /// Compute this definition's outcome from already-resolved dependency
    /// values in the context. Never triggers resolution of other plugins.
    ///
    /// `Err` is reserved for contract violations (not initialized,
    /// destroyed); plugin-level failures come back as
    /// [`DefinitionOutcome::Failed`].
    pub fn resolve(&self, ctx: &ResolutionContext) -> ResolveResult<DefinitionOutcome> {
        self.config.ensure_usable()?;

        let source_values = match ctx.dependency_values(&self.config.dependencies) {
            Ok(values) => values,
            Err(failure) if self.has_default() => {
                debug!(
                    definition = %self.config.id,
                    source = %failure.source_id,
                    "dependency failed; substituting default"
                );
                Vec::new()
            }
            Err(failure) => {
                return Ok(DefinitionOutcome::Failed(format!(
                    "dependency '{}' failed: {}",
                    failure.source_id, failure.reason
                )))
            }
        };

        let transformed = match self.kind_transform(&source_values) {
            Ok(values) => values,
            Err(e) => return Ok(DefinitionOutcome::Failed(e.to_string())),
        };

        let mut output = match &self.value_map {
            Some(map) => match map.apply(&transformed) {
                Ok(values) => values,
                Err(e) => return Ok(DefinitionOutcome::Failed(e.to_string())),
            },
            None => transformed,
        };

        if output.is_empty() {
            if let Some(default) = &self.default_value {
                output.push(AttributeValue::Str(default.clone()));
            }
        }

        if output.is_empty() {
            return Ok(DefinitionOutcome::Empty);
        }
        Ok(DefinitionOutcome::Resolved(Attribute {
            id: self.config.id.as_str().to_string(),
            values: output,
        }))
    }

    fn kind_transform(
        &self,
        values: &[AttributeValue],
    ) -> Result<Vec<AttributeValue>, TransformError> {
        match &self.kind {
            DefinitionKind::Simple => Ok(values.to_vec()),
            DefinitionKind::Scoped { scope } => attach_scope(values, scope),
            DefinitionKind::RegexSplit { pattern } => {
                // Normally compiled at initialize(); resolve() is gated
                // on the Initialized state.
                let fallback;
                let regex = match &self.split_regex {
                    Some(regex) => regex,
                    None => {
                        fallback = Regex::new(pattern).map_err(|source| {
                            TransformError::InvalidPattern {
                                pattern: pattern.clone(),
                                source,
                            }
                        })?;
                        &fallback
                    }
                };
                let mut out = Vec::new();
                for value in values {
                    let source = crate::transform::expect_string(value)?;
                    if let Some(caps) = regex.captures(source) {
                        if let Some(group) = caps.get(1) {
                            out.push(AttributeValue::Str(group.as_str().to_string()));
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}
