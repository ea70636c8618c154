//! Data connectors: plugins that pull raw attributes from external sources

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::attribute::{Attribute, AttributeValue};

use super::cache::ResultsCache;
use super::context::{ConnectorOutcome, ResolutionContext, ResolutionRequest};
use super::engine::ResolveResult;
use super::plugin::{ActivationCondition, Dependency, LifecycleState, PluginConfig, PluginId};

/// Errors an external source can surface to the engine.
///
/// Timeout and cancellation policy live inside the source implementation;
/// the engine only ever sees success or one of these failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("query timed out after {0}")]
    Timeout(String),
}

/// Black-box contract between a connector and its external system
/// (LDAP search, SQL query, HTTP call, ...).
///
/// `dependencies` carries the values of the owning connector's declared
/// dependencies, already resolved, in declaration order — this is how a
/// search base or filter fragment computed by another plugin reaches the
/// source. Synchronous and blocking from the engine's point of view.
pub trait AttributeSource: Send + Sync {
    /// Fetch raw attributes for the request, keyed by raw attribute name
    fn fetch(
        &self,
        request: &ResolutionRequest,
        dependencies: &[AttributeValue],
    ) -> Result<HashMap<String, Attribute>, SourceError>;
}

/// A fixed attribute map — deployment constants and test fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    attributes: HashMap<String, Attribute>,
}

impl StaticSource {
    /// Create an empty static source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.id.clone(), attribute);
        self
    }
}

impl AttributeSource for StaticSource {
    fn fetch(
        &self,
        _request: &ResolutionRequest,
        _dependencies: &[AttributeValue],
    ) -> Result<HashMap<String, Attribute>, SourceError> {
        Ok(self.attributes.clone())
    }
}

/// A plugin fetching raw attributes from an external source.
pub struct DataConnector {
    config: PluginConfig,
    source: Box<dyn AttributeSource>,
    no_result_is_error: bool,
    cache: Option<ResultsCache>,
}

impl DataConnector {
    /// Create a connector over a source
    pub fn new(id: impl Into<PluginId>, source: impl AttributeSource + 'static) -> Self {
        Self::from_boxed(id, Box::new(source))
    }

    /// Create a connector over an already boxed source
    pub fn from_boxed(id: impl Into<PluginId>, source: Box<dyn AttributeSource>) -> Self {
        Self {
            config: PluginConfig::new(id),
            source,
            no_result_is_error: false,
            cache: None,
        }
    }

    // --- Configuration (legal before initialize only) ---

    /// Add a dependency edge (connectors may depend on definitions or
    /// other connectors, e.g. to resolve a search base)
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.config = self.config.with_dependency(dependency);
        self
    }

    /// Set the activation condition
    pub fn with_activation(mut self, condition: ActivationCondition) -> Self {
        self.config = self.config.with_activation(condition);
        self
    }

    /// Treat zero results from the source as a failure
    pub fn no_result_is_error(mut self, flag: bool) -> Self {
        self.no_result_is_error = flag;
        self
    }

    /// Attach a cross-request results cache
    pub fn with_cache(mut self, cache: ResultsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Abort the whole request when this connector fails
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

    // --- Lifecycle ---

    /// Validate configuration and lock the connector
    pub fn initialize(&mut self) -> ResolveResult<()> {
        self.config.initialize()
    }

    /// Tear down; terminal
    pub fn destroy(&mut self) {
        self.config.destroy();
    }

    // --- Resolution ---

    /// Fetch raw attributes for the request, consulting the results
    /// cache first when one is configured. Dependency values are read
    /// out of the context and handed to the source.
    ///
    /// `Err` is reserved for contract violations; source and dependency
    /// failures come back as [`ConnectorOutcome::Failed`].
    pub fn resolve(&self, ctx: &ResolutionContext) -> ResolveResult<ConnectorOutcome> {
        self.config.ensure_usable()?;

        let fingerprint = self.fingerprint(&ctx.request);
        if let Some(cache) = &self.cache {
            if let Some(attributes) = cache.get(&fingerprint) {
                debug!(connector = %self.config.id, "results cache hit");
                return Ok(Self::outcome_from(attributes));
            }
        }

        let dependencies = match ctx.dependency_values(&self.config.dependencies) {
            Ok(values) => values,
            Err(failure) => {
                return Ok(ConnectorOutcome::Failed(format!(
                    "dependency '{}' failed: {}",
                    failure.source_id, failure.reason
                )))
            }
        };

        let attributes = match self.source.fetch(&ctx.request, &dependencies) {
            Ok(attributes) => attributes,
            Err(e) => return Ok(ConnectorOutcome::Failed(e.to_string())),
        };

        if attributes.is_empty() && self.no_result_is_error {
            return Ok(ConnectorOutcome::Failed(
                "source returned no results".to_string(),
            ));
        }

        if let Some(cache) = &self.cache {
            cache.insert(fingerprint, attributes.clone());
        }
        Ok(Self::outcome_from(attributes))
    }

    fn outcome_from(attributes: HashMap<String, Attribute>) -> ConnectorOutcome {
        if attributes.is_empty() {
            ConnectorOutcome::Empty
        } else {
            ConnectorOutcome::Resolved(attributes)
        }
    }

    /// Request fingerprint used as the cache key. The engine only knows
    /// principal and relying party; source-specific parameters are the
    /// source's own business.
    fn fingerprint(&self, request: &ResolutionRequest) -> String {
        format!("{}|{}", request.principal, request.relying_party)
    }
}

impl std::fmt::Debug for DataConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataConnector")
            .field("config", &self.config)
            .field("no_result_is_error", &self.no_result_is_error)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Source that counts fetches — used to observe cache short-circuits.
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        attributes: HashMap<String, Attribute>,
    }

    impl AttributeSource for CountingSource {
        fn fetch(
            &self,
            _request: &ResolutionRequest,
            _dependencies: &[AttributeValue],
        ) -> Result<HashMap<String, Attribute>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.attributes.clone())
        }
    }

    struct FailingSource;

    impl AttributeSource for FailingSource {
        fn fetch(
            &self,
            _request: &ResolutionRequest,
            _dependencies: &[AttributeValue],
        ) -> Result<HashMap<String, Attribute>, SourceError> {
            Err(SourceError::Unreachable("ldap://idp.example.org".to_string()))
        }
    }

    fn ctx() -> ResolutionContext {
        ResolutionContext::new(ResolutionRequest::new("jdoe", "https://sp.example.org"))
    }

    #[test]
    fn static_source_resolves_configured_attributes() {
        let mut connector = DataConnector::new(
            "connector1",
            StaticSource::new().with_attribute(Attribute::from_strings(
                "eduPersonAffiliation",
                ["member"],
            )),
        );
        connector.initialize().unwrap();

        let ConnectorOutcome::Resolved(attrs) = connector.resolve(&ctx()).unwrap() else {
            panic!("expected resolved outcome");
        };
        assert_eq!(attrs["eduPersonAffiliation"].values.len(), 1);
    }

    #[test]
    fn empty_result_is_empty_unless_flagged() {
        let mut tolerant = DataConnector::new("dc", StaticSource::new());
        tolerant.initialize().unwrap();
        assert_eq!(tolerant.resolve(&ctx()).unwrap(), ConnectorOutcome::Empty);

        let mut strict = DataConnector::new("dc", StaticSource::new()).no_result_is_error(true);
        strict.initialize().unwrap();
        assert!(matches!(
            strict.resolve(&ctx()).unwrap(),
            ConnectorOutcome::Failed(_)
        ));
    }

    #[test]
    fn source_failure_is_recorded_not_thrown() {
        let mut connector = DataConnector::new("dc", FailingSource);
        connector.initialize().unwrap();

        let ConnectorOutcome::Failed(reason) = connector.resolve(&ctx()).unwrap() else {
            panic!("expected failed outcome");
        };
        assert!(reason.contains("unreachable"));
    }

    #[test]
    fn results_cache_short_circuits_across_contexts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), Attribute::from_strings("uid", ["jdoe"]));

        let mut connector = DataConnector::new(
            "dc",
            CountingSource {
                calls: calls.clone(),
                attributes: attrs,
            },
        )
        .with_cache(ResultsCache::new(16, Duration::minutes(5)));
        connector.initialize().unwrap();

        // Two distinct contexts, same fingerprint: one external call.
        connector.resolve(&ctx()).unwrap();
        connector.resolve(&ctx()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Different principal, different fingerprint: second call.
        let other = ResolutionContext::new(ResolutionRequest::new("asmith", "sp"));
        connector.resolve(&other).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resolve_before_initialize_is_a_contract_violation() {
        let connector = DataConnector::new("dc", StaticSource::new());
        assert!(connector.resolve(&ctx()).is_err());
    }

    #[test]
    fn source_receives_resolved_dependency_values() {
        use crate::resolver::context::DefinitionOutcome;

        /// Source that searches under a base computed by another plugin.
        struct BasedSource;

        impl AttributeSource for BasedSource {
            fn fetch(
                &self,
                _request: &ResolutionRequest,
                dependencies: &[AttributeValue],
            ) -> Result<HashMap<String, Attribute>, SourceError> {
                let base = dependencies
                    .first()
                    .and_then(AttributeValue::as_str)
                    .ok_or_else(|| SourceError::Query("no search base".to_string()))?;
                let mut attrs = HashMap::new();
                attrs.insert(
                    "dn".to_string(),
                    Attribute::from_strings("dn", [format!("uid=jdoe,{base}")]),
                );
                Ok(attrs)
            }
        }

        let mut ctx = ctx();
        ctx.record_definition(
            PluginId::from("searchBase"),
            DefinitionOutcome::Resolved(Attribute::from_strings(
                "searchBase",
                ["ou=people,dc=example,dc=org"],
            )),
        );

        let mut connector = DataConnector::new("ldap", BasedSource)
            .with_dependency(Dependency::on("searchBase"));
        connector.initialize().unwrap();

        let ConnectorOutcome::Resolved(attrs) = connector.resolve(&ctx).unwrap() else {
            panic!("expected resolved outcome");
        };
        assert_eq!(
            attrs["dn"].values[0].to_string(),
            "uid=jdoe,ou=people,dc=example,dc=org"
        );
    }

    #[test]
    fn failed_dependency_fails_the_connector() {
        let mut ctx = ctx();
        ctx.record_connector(
            PluginId::from("upstream"),
            ConnectorOutcome::Failed("boom".to_string()),
        );

        let mut connector = DataConnector::new("dc", StaticSource::new())
            .with_dependency(Dependency::on("upstream"));
        connector.initialize().unwrap();

        let ConnectorOutcome::Failed(reason) = connector.resolve(&ctx).unwrap() else {
            panic!("expected failed outcome");
        };
        assert!(reason.contains("upstream"));
        assert!(reason.contains("boom"));
    }
}
