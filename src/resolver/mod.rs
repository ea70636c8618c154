//! The attribute resolution engine and its plugin contracts

mod cache;
mod connector;
mod context;
mod definition;
mod engine;
mod plugin;


pub use cache::ResultsCache;
pub use connector::{AttributeSource, DataConnector, SourceError, StaticSource};
pub use context::{
    ConnectorOutcome, DefinitionOutcome, DependencyFailure, ResolutionContext, ResolutionRequest,
};
pub use definition::{AttributeDefinition, DefinitionKind};
pub use engine::{AttributeResolver, Plugin, ResolveError, ResolveResult};
pub use plugin::{ActivationCondition, Dependency, LifecycleState, PluginConfig, PluginId};
