//! Declarative graph loader — YAML-driven resolver construction
//!
//! Deployments describe connectors, definitions, and resolution profiles
//! in YAML instead of Rust. `GraphSpec` validates the description
//! (unique ids, dependencies naming declared plugins, profiles naming
//! declared plugins), constructs and initializes every plugin, and hands
//! back a ready [`AttributeService`].
//!
//! Static validation here does not replace the engine's dynamic cycle
//! check; it only catches what a single spec file can show.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

use crate::attribute::Attribute;
use crate::resolver::{
    ActivationCondition, AttributeDefinition, AttributeResolver, AttributeSource, DataConnector,
    Dependency, Plugin, PluginId, ResolveError, ResultsCache, StaticSource,
};
use crate::service::AttributeService;
use crate::transform::ValueMap;

/// Errors raised while loading a graph spec
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("spec read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spec parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("duplicate plugin id in spec: {0}")]
    DuplicateId(String),

    #[error("plugin '{plugin}' depends on undeclared plugin '{dependency}'")]
    UnknownDependency { plugin: String, dependency: String },

    #[error("profile '{profile}' requests undeclared plugin '{id}'")]
    UnknownProfilePlugin { profile: String, id: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// One dependency edge in the spec
#[derive(Debug, Clone, Deserialize)]
pub struct DependencySpec {
    /// Source plugin id
    pub source: String,
    /// Optional raw attribute of a connector source
    #[serde(default)]
    pub attribute: Option<String>,
}

impl DependencySpec {
    fn to_dependency(&self) -> Dependency {
        match &self.attribute {
            Some(attr) => Dependency::on_attribute(self.source.as_str(), attr),
            None => Dependency::on(self.source.as_str()),
        }
    }
}

/// Activation gate in the spec
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationSpec {
    /// Activate only for this relying party
    pub requester: String,
}

/// Results-cache bounds in the spec
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSpec {
    /// Maximum cached fingerprints
    pub max_entries: usize,
    /// Entry time-to-live in seconds
    pub ttl_seconds: i64,
}

/// A data connector in the spec.
///
/// `attributes` describes a static source inline; connectors backed by
/// external systems leave it empty and register their
/// [`AttributeSource`] via [`GraphSpec::build_with_sources`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorSpec {
    pub id: String,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub no_result_is_error: bool,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub cache: Option<CacheSpec>,
    #[serde(default)]
    pub activation: Option<ActivationSpec>,
}

/// Definition kind selector
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindSpec {
    #[default]
    Simple,
    Scoped {
        scope: String,
    },
    RegexSplit {
        pattern: String,
    },
}

/// An attribute definition in the spec
#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionSpec {
    pub id: String,
    #[serde(default)]
    pub kind: KindSpec,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub value_map: Option<ValueMap>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub activation: Option<ActivationSpec>,
}

/// A whole declarative resolver graph
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub connectors: Vec<ConnectorSpec>,
    #[serde(default)]
    pub definitions: Vec<DefinitionSpec>,
    #[serde(default)]
    pub profiles: HashMap<String, Vec<String>>,
}

impl GraphSpec {
    /// Parse a spec from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, LoaderError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a spec from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Validate, construct, and initialize the graph using the inline
    /// static attributes for every connector
    pub fn build(self) -> Result<AttributeService, LoaderError> {
        self.build_with_sources(HashMap::new())
    }

    /// Like [`GraphSpec::build`], with externally supplied sources for
    /// connectors backed by real systems (LDAP, SQL, HTTP). A connector
    /// id absent from `sources` falls back to its inline attributes.
    pub fn build_with_sources(
        self,
        mut sources: HashMap<String, Box<dyn AttributeSource>>,
    ) -> Result<AttributeService, LoaderError> {
        self.validate()?;

        let mut plugins: Vec<Plugin> = Vec::new();
        for spec in &self.connectors {
            let mut connector = match sources.remove(&spec.id) {
                Some(source) => DataConnector::from_boxed(spec.id.as_str(), source),
                None => DataConnector::new(spec.id.as_str(), static_source(&spec.attributes)),
            };
            for dep in &spec.dependencies {
                connector = connector.with_dependency(dep.to_dependency());
            }
            if let Some(activation) = &spec.activation {
                connector = connector
                    .with_activation(ActivationCondition::RequesterIs(activation.requester.clone()));
            }
            if let Some(cache) = &spec.cache {
                connector = connector.with_cache(ResultsCache::new(
                    cache.max_entries,
                    Duration::seconds(cache.ttl_seconds),
                ));
            }
            connector = connector
                .no_result_is_error(spec.no_result_is_error)
                .fail_fast(spec.fail_fast);
            plugins.push(Plugin::from(connector));
        }

        for spec in &self.definitions {
            let mut definition = match &spec.kind {
                KindSpec::Simple => AttributeDefinition::simple(spec.id.as_str()),
                KindSpec::Scoped { scope } => {
                    AttributeDefinition::scoped(spec.id.as_str(), scope)
                }
                KindSpec::RegexSplit { pattern } => {
                    AttributeDefinition::regex_split(spec.id.as_str(), pattern)
                }
            };
            for dep in &spec.dependencies {
                definition = definition.with_dependency(dep.to_dependency());
            }
            if let Some(map) = &spec.value_map {
                definition = definition.with_value_map(map.clone());
            }
            if let Some(default) = &spec.default {
                definition = definition.with_default(default);
            }
            if let Some(activation) = &spec.activation {
                definition = definition
                    .with_activation(ActivationCondition::RequesterIs(activation.requester.clone()));
            }
            definition = definition.fail_fast(spec.fail_fast);
            plugins.push(Plugin::from(definition));
        }

        for plugin in &mut plugins {
            plugin.initialize()?;
        }
        let resolver = AttributeResolver::new(plugins)?;

        let profiles = self
            .profiles
            .into_iter()
            .map(|(name, ids)| (name, ids.into_iter().map(PluginId::from).collect()))
            .collect();
        Ok(AttributeService::new(resolver, profiles))
    }

    fn validate(&self) -> Result<(), LoaderError> {
        let mut ids: HashSet<&str> = HashSet::new();
        for id in self
            .connectors
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.definitions.iter().map(|d| d.id.as_str()))
        {
            if !ids.insert(id) {
                return Err(LoaderError::DuplicateId(id.to_string()));
            }
        }

        let deps = self
            .connectors
            .iter()
            .flat_map(|c| c.dependencies.iter().map(move |d| (c.id.as_str(), d)))
            .chain(
                self.definitions
                    .iter()
                    .flat_map(|d| d.dependencies.iter().map(move |dep| (d.id.as_str(), dep))),
            );
        for (plugin, dep) in deps {
            if !ids.contains(dep.source.as_str()) {
                return Err(LoaderError::UnknownDependency {
                    plugin: plugin.to_string(),
                    dependency: dep.source.clone(),
                });
            }
        }

        for (profile, requested) in &self.profiles {
            for id in requested {
                if !ids.contains(id.as_str()) {
                    return Err(LoaderError::UnknownProfilePlugin {
                        profile: profile.clone(),
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn static_source(attributes: &HashMap<String, Vec<String>>) -> StaticSource {
    attributes
        .iter()
        .fold(StaticSource::new(), |source, (name, values)| {
            source.with_attribute(Attribute::from_strings(name.clone(), values.clone()))
        })
}
