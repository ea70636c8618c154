//! Graph building utilities for integration tests
//!
//! Builds small resolver graphs around counting and failing sources so
//! tests can assert invocation counts and failure isolation.

use attributor::{
    Attribute, AttributeDefinition, AttributeResolver, AttributeSource, AttributeValue,
    DataConnector, Dependency, Plugin, ResolutionRequest, SourceError, StaticSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Source that counts fetches and serves a fixed attribute map.
pub struct CountingSource {
    calls: Arc<AtomicUsize>,
    attributes: HashMap<String, Attribute>,
}

impl CountingSource {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.id.clone(), attribute);
        self
    }
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

/// Source that always fails with an unreachable error.
pub struct FailingSource;

impl AttributeSource for FailingSource {
    fn fetch(
        &self,
        _request: &ResolutionRequest,
        _dependencies: &[AttributeValue],
    ) -> Result<HashMap<String, Attribute>, SourceError> {
        Err(SourceError::Unreachable("test source down".to_string()))
    }
}

/// Initialize a plugin or panic with its configuration error.
pub fn initialized<P: Into<Plugin>>(plugin: P) -> Plugin {
    let mut plugin = plugin.into();
    plugin
        .initialize()
        .unwrap_or_else(|e| panic!("plugin failed to initialize: {e}"));
    plugin
}

/// A directory-style static connector exposing uid, mail, and
/// eduPersonAffiliation for any principal.
pub fn directory_connector(id: &str) -> Plugin {
    initialized(DataConnector::new(
        id,
        StaticSource::new()
            .with_attribute(Attribute::from_strings("uid", ["jdoe"]))
            .with_attribute(Attribute::from_strings("mail", ["jdoe@example.org"]))
            .with_attribute(Attribute::from_strings(
                "eduPersonAffiliation",
                ["member", "staff"],
            )),
    ))
}

/// A chain of `depth` simple definitions, each depending on the
/// previous, rooted at `root_source`. Returns the plugins and the id of
/// the chain head.
pub fn definition_chain(
    root_source: &str,
    attribute: &str,
    depth: usize,
) -> (Vec<Plugin>, String) {
    let mut plugins = Vec::new();
    let mut previous = root_source.to_string();
    let mut head = previous.clone();
    for level in 0..depth {
        let id = format!("chain{level}");
        let dep = if level == 0 {
            Dependency::on_attribute(previous.as_str(), attribute)
        } else {
            Dependency::on(previous.as_str())
        };
        plugins.push(initialized(
            AttributeDefinition::simple(id.as_str()).with_dependency(dep),
        ));
        previous = id.clone();
        head = id;
    }
    (plugins, head)
}

/// Build a resolver, panicking on configuration errors.
pub fn resolver(plugins: Vec<Plugin>) -> AttributeResolver {
    AttributeResolver::new(plugins).unwrap_or_else(|e| panic!("bad test graph: {e}"))
}
