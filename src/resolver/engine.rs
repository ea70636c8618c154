//! AttributeResolver: depth-first resolution over the plugin graph

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error};

use super::connector::DataConnector;
use super::context::{ConnectorOutcome, DefinitionOutcome, ResolutionContext};
use super::definition::AttributeDefinition;
use super::plugin::{ActivationCondition, Dependency, LifecycleState, PluginId};

fn join_chain(chain: &[PluginId]) -> String {
    chain
        .iter()
        .map(PluginId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors that abort a whole `resolve()` call.
///
/// All variants except `FatalPlugin` are configuration errors: they
/// indicate a bad graph or a misused lifecycle, never a transient
/// per-request condition, and are not retried.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("circular plugin dependency: {}", join_chain(.chain))]
    CircularDependency { chain: Vec<PluginId> },

    #[error("plugin not found: {0}")]
    PluginNotFound(PluginId),

    #[error("plugin not initialized: {0}")]
    NotInitialized(PluginId),

    #[error("plugin destroyed: {0}")]
    Destroyed(PluginId),

    #[error("plugin {id} misconfigured: {detail}")]
    MissingConfiguration { id: PluginId, detail: String },

    #[error("duplicate plugin id: {0}")]
    DuplicatePluginId(PluginId),

    #[error("plugin {id} failed ({reason}); dependency chain: {}", join_chain(.chain))]
    FatalPlugin {
        id: PluginId,
        chain: Vec<PluginId>,
        reason: String,
    },
}

/// Result type for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// The closed family of plugin kinds the engine dispatches over.
#[derive(Debug)]
pub enum Plugin {
    /// Computes one named attribute from dependency data
    Definition(AttributeDefinition),
    /// Fetches raw attributes from an external source
    Connector(DataConnector),
}

impl Plugin {
    /// Plugin id
    pub fn id(&self) -> &PluginId {
        match self {
            Self::Definition(d) => d.id(),
            Self::Connector(c) => c.id(),
        }
    }

    /// Declared dependencies, in order
    pub fn dependencies(&self) -> &[Dependency] {
        match self {
            Self::Definition(d) => d.dependencies(),
            Self::Connector(c) => c.dependencies(),
        }
    }

    /// Activation condition
    pub fn activation_condition(&self) -> &ActivationCondition {
        match self {
            Self::Definition(d) => d.activation_condition(),
            Self::Connector(c) => c.activation_condition(),
        }
    }

    /// Fatality policy
    pub fn is_fail_fast(&self) -> bool {
        match self {
            Self::Definition(d) => d.is_fail_fast(),
            Self::Connector(c) => c.is_fail_fast(),
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> LifecycleState {
        match self {
            Self::Definition(d) => d.state(),
            Self::Connector(c) => c.state(),
        }
    }

    /// Validate and lock
    pub fn initialize(&mut self) -> ResolveResult<()> {
        match self {
            Self::Definition(d) => d.initialize(),
            Self::Connector(c) => c.initialize(),
        }
    }

    /// Tear down; terminal
    pub fn destroy(&mut self) {
        match self {
            Self::Definition(d) => d.destroy(),
            Self::Connector(c) => c.destroy(),
        }
    }
}

impl From<AttributeDefinition> for Plugin {
    fn from(definition: AttributeDefinition) -> Self {
        Self::Definition(definition)
    }
}

impl From<DataConnector> for Plugin {
    fn from(connector: DataConnector) -> Self {
        Self::Connector(connector)
    }
}

/// The resolution engine: an immutable, initialized plugin graph walked
/// depth-first once per request.
///
/// Shared read-only across concurrent requests; all per-request state
/// lives in the [`ResolutionContext`].
#[derive(Debug)]
pub struct AttributeResolver {
    plugins: HashMap<PluginId, Plugin>,
}

impl AttributeResolver {
    /// Build a resolver from initialized plugins.
    ///
    /// Rejects duplicate ids and plugins not in the `Initialized` state.
    /// Dependency targets are checked lazily during resolution, because
    /// graphs assembled from multiple modules may reference plugins the
    /// static loader never saw.
    pub fn new(plugins: Vec<Plugin>) -> ResolveResult<Self> {
        let mut map = HashMap::with_capacity(plugins.len());
        for plugin in plugins {
            match plugin.state() {
                LifecycleState::Initialized => {}
                LifecycleState::Destroyed => {
                    return Err(ResolveError::Destroyed(plugin.id().clone()))
                }
                _ => return Err(ResolveError::NotInitialized(plugin.id().clone())),
            }
            let id = plugin.id().clone();
            if map.insert(id.clone(), plugin).is_some() {
                return Err(ResolveError::DuplicatePluginId(id));
            }
        }
        Ok(Self { plugins: map })
    }

    /// Look up a plugin by id
    pub fn plugin(&self, id: &PluginId) -> Option<&Plugin> {
        self.plugins.get(id)
    }

    /// Number of plugins in the graph
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Resolve the requested plugins (and, transitively, everything they
    /// depend on) into the context.
    ///
    /// Each plugin's resolution logic runs at most once per context; a
    /// repeated id in `requested` or shared dependencies are memo hits.
    /// Returns `Err` only for configuration errors and fail-fast plugin
    /// failures; best-effort failures are recorded in the context and
    /// simply missing from the exported attribute set.
    pub fn resolve(
        &self,
        ctx: &mut ResolutionContext,
        requested: &[PluginId],
    ) -> ResolveResult<()> {
        for id in requested {
            self.resolve_plugin(ctx, id)?;
        }
        Ok(())
    }

    fn resolve_plugin(&self, ctx: &mut ResolutionContext, id: &PluginId) -> ResolveResult<()> {
        if ctx.is_resolved(id) {
            return Ok(());
        }
        if ctx.is_in_progress(id) {
            // Cycles should have been rejected at load time, but graphs
            // linked across modules can form cycles static validation
            // never saw. Fail the whole request.
            let chain = ctx.cycle_chain(id);
            error!(context = %ctx.id, chain = %join_chain(&chain), "circular plugin dependency");
            return Err(ResolveError::CircularDependency { chain });
        }
        let plugin = self
            .plugins
            .get(id)
            .ok_or_else(|| ResolveError::PluginNotFound(id.clone()))?;

        ctx.push_in_progress(id.clone());
        let result = self.resolve_locked(ctx, plugin);
        ctx.pop_in_progress();
        result
    }

    /// Body of the per-plugin walk; the caller holds the in-progress
    /// sentinel for `plugin` and pops it regardless of the outcome.
    fn resolve_locked(&self, ctx: &mut ResolutionContext, plugin: &Plugin) -> ResolveResult<()> {
        let id = plugin.id();

        if !plugin.activation_condition().applies(&ctx.request) {
            debug!(plugin = %id, context = %ctx.id, "activation condition false; skipping");
            self.record_skipped(ctx, plugin);
            return Ok(());
        }

        // Dependencies first, in declaration order. A failed dependency
        // is recorded in the context, not propagated here: the dependent
        // plugin decides whether that is fatal when it reads the memo.
        for dep in plugin.dependencies() {
            self.resolve_plugin(ctx, &dep.source_id)?;
        }

        match plugin {
            Plugin::Definition(definition) => {
                let outcome = definition.resolve(ctx)?;
                debug!(plugin = %id, context = %ctx.id, outcome = outcome_tag(&outcome), "definition resolved");
                let failed_reason = match &outcome {
                    DefinitionOutcome::Failed(reason) => Some(reason.clone()),
                    _ => None,
                };
                ctx.record_definition(id.clone(), outcome);
                if let Some(reason) = failed_reason {
                    return self.handle_failure(ctx, plugin, reason);
                }
            }
            Plugin::Connector(connector) => {
                let outcome = connector.resolve(ctx)?;
                debug!(plugin = %id, context = %ctx.id, outcome = connector_tag(&outcome), "connector resolved");
                let failed_reason = match &outcome {
                    ConnectorOutcome::Failed(reason) => Some(reason.clone()),
                    _ => None,
                };
                ctx.record_connector(id.clone(), outcome);
                if let Some(reason) = failed_reason {
                    return self.handle_failure(ctx, plugin, reason);
                }
            }
        }
        Ok(())
    }

    fn record_skipped(&self, ctx: &mut ResolutionContext, plugin: &Plugin) {
        match plugin {
            Plugin::Definition(_) => {
                ctx.record_definition(plugin.id().clone(), DefinitionOutcome::Empty)
            }
            Plugin::Connector(_) => {
                ctx.record_connector(plugin.id().clone(), ConnectorOutcome::Empty)
            }
        }
    }

    fn handle_failure(
        &self,
        ctx: &ResolutionContext,
        plugin: &Plugin,
        reason: String,
    ) -> ResolveResult<()> {
        if plugin.is_fail_fast() {
            let chain = ctx.resolution_chain().to_vec();
            error!(plugin = %plugin.id(), context = %ctx.id, %reason, "fail-fast plugin failed");
            return Err(ResolveError::FatalPlugin {
                id: plugin.id().clone(),
                chain,
                reason,
            });
        }
        debug!(plugin = %plugin.id(), context = %ctx.id, %reason, "best-effort plugin failed");
        Ok(())
    }
}

fn outcome_tag(outcome: &DefinitionOutcome) -> &'static str {
    match outcome {
        DefinitionOutcome::Resolved(_) => "resolved",
        DefinitionOutcome::Empty => "empty",
        DefinitionOutcome::Failed(_) => "failed",
    }
}

fn connector_tag(outcome: &ConnectorOutcome) -> &'static str {
    match outcome {
        ConnectorOutcome::Resolved(_) => "resolved",
        ConnectorOutcome::Empty => "empty",
        ConnectorOutcome::Failed(_) => "failed",
    }
}
