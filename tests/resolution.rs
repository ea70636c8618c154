//! End-to-end resolution tests through the service layer

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use attributor::{
    Attribute, AttributeDefinition, AttributeService, DataConnector, Dependency, PluginId,
    ResolutionRequest, ResultsCache, ServiceError,
};
use chrono::Duration;
use common::graph_builder::{
    definition_chain, directory_connector, initialized, resolver, CountingSource, FailingSource,
};

fn profile(name: &str, ids: &[&str]) -> HashMap<String, Vec<PluginId>> {
    let mut profiles = HashMap::new();
    profiles.insert(name.to_string(), ids.iter().map(|i| PluginId::from(*i)).collect());
    profiles
}

fn request() -> ResolutionRequest {
    ResolutionRequest::new("jdoe", "https://sp.example.org")
}

#[test]
fn simple_definition_releases_connector_attribute() {
    let plugins = vec![
        directory_connector("connector1"),
        initialized(
            AttributeDefinition::simple("simple")
                .with_dependency(Dependency::on_attribute("connector1", "eduPersonAffiliation")),
        ),
    ];
    let service = AttributeService::new(resolver(plugins), profile("default", &["simple"]));

    let attrs = service.resolve("default", request()).unwrap();
    assert_eq!(attrs.len(), 1);
    let values: Vec<String> = attrs["simple"].values.iter().map(|v| v.to_string()).collect();
    assert_eq!(values, vec!["member", "staff"]);
}

#[test]
fn deep_chain_resolves_through_every_level() {
    let (mut plugins, head) = definition_chain("dir", "uid", 12);
    plugins.push(directory_connector("dir"));
    let service = AttributeService::new(resolver(plugins), profile("default", &[&head]));

    let attrs = service.resolve("default", request()).unwrap();
    assert_eq!(attrs[&head].values[0].to_string(), "jdoe");
}

#[test]
fn shared_dependency_fetches_once_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins = vec![
        initialized(DataConnector::new(
            "dc",
            CountingSource::new(calls.clone())
                .with_attribute(Attribute::from_strings("uid", ["jdoe"])),
        )),
        initialized(
            AttributeDefinition::simple("a").with_dependency(Dependency::on_attribute("dc", "uid")),
        ),
        initialized(
            AttributeDefinition::simple("b").with_dependency(Dependency::on_attribute("dc", "uid")),
        ),
    ];
    let service = AttributeService::new(resolver(plugins), profile("default", &["a", "b"]));

    service.resolve("default", request()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A second request is a fresh context: the connector runs again.
    service.resolve("default", request()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn results_cache_spans_requests() {
    let calls = Arc::new(AtomicUsize::new(0));
    let plugins = vec![
        initialized(
            DataConnector::new(
                "dc",
                CountingSource::new(calls.clone())
                    .with_attribute(Attribute::from_strings("uid", ["jdoe"])),
            )
            .with_cache(ResultsCache::new(32, Duration::minutes(5))),
        ),
        initialized(
            AttributeDefinition::simple("uid")
                .with_dependency(Dependency::on_attribute("dc", "uid")),
        ),
    ];
    let service = AttributeService::new(resolver(plugins), profile("default", &["uid"]));

    service.resolve("default", request()).unwrap();
    service.resolve("default", request()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different principal misses the cache.
    service
        .resolve("default", ResolutionRequest::new("asmith", "https://sp.example.org"))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn best_effort_failure_leaves_partial_attribute_set() {
    common::init_tracing();
    let plugins = vec![
        directory_connector("dir"),
        initialized(DataConnector::new("down", FailingSource)),
        initialized(
            AttributeDefinition::simple("mail")
                .with_dependency(Dependency::on_attribute("dir", "mail")),
        ),
        initialized(
            AttributeDefinition::simple("entitlement").with_dependency(Dependency::on("down")),
        ),
    ];
    let service = AttributeService::new(
        resolver(plugins),
        profile("default", &["mail", "entitlement"]),
    );

    let attrs = service.resolve("default", request()).unwrap();
    assert_eq!(attrs.len(), 1);
    assert!(attrs.contains_key("mail"));
    assert!(!attrs.contains_key("entitlement"));
}

#[test]
fn fail_fast_failure_aborts_with_the_plugin_named() {
    common::init_tracing();
    let plugins = vec![
        directory_connector("dir"),
        initialized(DataConnector::new("down", FailingSource).fail_fast(true)),
        initialized(
            AttributeDefinition::simple("entitlement").with_dependency(Dependency::on("down")),
        ),
    ];
    let service =
        AttributeService::new(resolver(plugins), profile("default", &["entitlement"]));

    let err = service.resolve("default", request()).unwrap_err();
    let ServiceError::Resolve(inner) = err else {
        panic!("expected resolve error, got {err}");
    };
    assert!(inner.to_string().contains("down"));
}

#[test]
fn concurrent_requests_share_one_graph() {
    let plugins = vec![
        directory_connector("dir"),
        initialized(
            AttributeDefinition::simple("uid")
                .with_dependency(Dependency::on_attribute("dir", "uid")),
        ),
        initialized(
            AttributeDefinition::scoped("scopedUid", "example.org")
                .with_dependency(Dependency::on("uid")),
        ),
    ];
    let service = AttributeService::new(
        resolver(plugins),
        profile("default", &["uid", "scopedUid"]),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            thread::spawn(move || {
                let request =
                    ResolutionRequest::new(format!("user{i}"), "https://sp.example.org");
                service.resolve("default", request).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let attrs = handle.join().unwrap();
        assert_eq!(attrs["scopedUid"].values[0].to_string(), "jdoe@example.org");
    }
}
