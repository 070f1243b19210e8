//! # Config Resolver Tests
//!
//! Exactly-one selection over the in-memory store, including the default
//! selector used for blank intent selectors.

mod common;

use common::{east_config, FakeStore};
use mesh_federation_controller::constants::DEFAULT_CONFIG_SELECTOR;
use mesh_federation_controller::controller::resolver::{resolve, ResolveError};
use mesh_federation_controller::crd::FederationConfig;
use mesh_federation_controller::store::StoreError;
use std::collections::BTreeMap;

fn labelled(name: &str, namespace: &str, labels: &[(&str, &str)]) -> FederationConfig {
    let mut config = east_config();
    config.metadata.name = Some(name.to_string());
    config.metadata.namespace = Some(namespace.to_string());
    config.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    );
    config
}

#[tokio::test]
async fn test_single_match_is_returned() {
    let store = FakeStore::new();
    store.insert_config(east_config());
    store.insert_config(labelled("west", "mesh-system", &[("team", "west")]));

    let config = resolve("team=east", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap();
    assert_eq!(config.metadata.name.as_deref(), Some("east"));
}

#[tokio::test]
async fn test_no_match_is_config_not_found() {
    let store = FakeStore::new();
    store.insert_config(east_config());

    let err = resolve("team=north", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResolveError::ConfigNotFound {
            selector: "team=north".to_string()
        }
    );
}

#[tokio::test]
async fn test_multiple_matches_are_ambiguous() {
    let store = FakeStore::new();
    store.insert_config(east_config());
    store.insert_config(labelled("east-b", "other", &[("team", "east")]));

    let err = resolve("team=east", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap_err();
    match err {
        ResolveError::AmbiguousConfig { selector, matches } => {
            assert_eq!(selector, "team=east");
            assert_eq!(matches, vec!["mesh-system/east".to_string(), "other/east-b".to_string()]);
        }
        other => panic!("expected AmbiguousConfig, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_selector_is_rejected_before_listing() {
    let store = FakeStore::new();
    store.fail(|f| f.list_configs = true);

    let err = resolve("team", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidSelector { .. }));
}

#[tokio::test]
async fn test_blank_selector_uses_default_config() {
    let store = FakeStore::new();
    store.insert_config(east_config());
    store.insert_config(labelled(
        "shared",
        "mesh-system",
        &[("federation.mesh.io/default", "true")],
    ));

    let config = resolve("  ", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap();
    assert_eq!(config.metadata.name.as_deref(), Some("shared"));
}

#[tokio::test]
async fn test_blank_selector_without_default_is_not_found() {
    let store = FakeStore::new();
    store.insert_config(east_config());

    let err = resolve("", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ConfigNotFound { .. }));
}

#[tokio::test]
async fn test_list_failure_is_surfaced() {
    let store = FakeStore::new();
    store.fail(|f| f.list_configs = true);

    let err = resolve("team=east", DEFAULT_CONFIG_SELECTOR, store.as_ref())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResolveError::Store(StoreError::Api("list failed".to_string()))
    );
}
