//! Attributor: Per-Request Identity Attribute Resolution
//!
//! An identity-provider attribute subsystem: given an authenticated
//! principal and a requesting relying party, it resolves the set of
//! identity attributes to release by executing a declarative graph of
//! attribute definitions and data connectors.
//!
//! # Core Concepts
//!
//! - **Data Connectors**: plugins fetching raw attributes from external
//!   sources (directories, databases, session state)
//! - **Attribute Definitions**: plugins computing one named output
//!   attribute from dependency data plus declarative transforms
//! - **Resolution Contexts**: per-request memoization and cycle-detection
//!   state — every plugin resolves at most once per request
//!
//! # Example
//!
//! ```
//! use attributor::{
//!     Attribute, AttributeDefinition, AttributeResolver, DataConnector, Dependency, Plugin,
//!     ResolutionContext, ResolutionRequest, StaticSource,
//! };
//!
//! let mut connector = Plugin::from(DataConnector::new(
//!     "directory",
//!     StaticSource::new().with_attribute(Attribute::from_strings("uid", ["jdoe"])),
//! ));
//! connector.initialize().unwrap();
//! let mut definition = Plugin::from(
//!     AttributeDefinition::simple("uid")
//!         .with_dependency(Dependency::on_attribute("directory", "uid")),
//! );
//! definition.initialize().unwrap();
//!
//! let resolver = AttributeResolver::new(vec![connector, definition]).unwrap();
//! let mut ctx = ResolutionContext::new(ResolutionRequest::new("jdoe", "https://sp.example.org"));
//! resolver.resolve(&mut ctx, &["uid".into()]).unwrap();
//! ```

mod attribute;
pub mod loader;
mod resolver;
pub mod service;
pub mod transform;

pub use attribute::{Attribute, AttributeValue};
pub use resolver::{
    ActivationCondition, AttributeDefinition, AttributeResolver, AttributeSource,
    ConnectorOutcome, DataConnector, DefinitionKind, DefinitionOutcome, Dependency,
    DependencyFailure, LifecycleState, Plugin, PluginConfig, PluginId, ResolutionContext,
    ResolutionRequest, ResolveError, ResolveResult, ResultsCache, SourceError, StaticSource,
};
pub use service::{AttributeService, ServiceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
