//! Tests for Registry
//!
//! These tests verify:
//! - One client per name, later settings ignored
//! - Name defaulting and the target/in-memory selection rules
//! - Store-open failures are surfaced and leave nothing behind
//! - A durable directory backs at most one name, across registries too
//! - Durable stores outlive their registry

use std::fs;

use bytes::Bytes;
use stashkv::{ClientOptions, Registry, StashError, StorageTarget, DEFAULT_STORE_NAME};
use tempfile::TempDir;

fn dir_string(dir: &TempDir, child: &str) -> String {
    dir.path().join(child).to_string_lossy().into_owned()
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_same_name_same_store() {
    let registry = Registry::new();

    let first = registry.get_or_create(&ClientOptions::memory("orders")).unwrap();
    let second = registry.get_or_create(&ClientOptions::memory("orders")).unwrap();

    first.set("k", "v").unwrap();
    assert_eq!(second.get("k").unwrap(), Bytes::from("v"));
    assert!(first.same_store(&second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_different_names_are_isolated() {
    let registry = Registry::new();

    let a = registry.get_or_create(&ClientOptions::memory("a")).unwrap();
    let b = registry.get_or_create(&ClientOptions::memory("b")).unwrap();

    a.set("k", "from-a").unwrap();
    assert!(b.get("k").unwrap_err().is_not_found());
    assert!(!a.same_store(&b));
    assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_second_request_ignores_target() {
    let registry = Registry::new();
    let temp = TempDir::new().unwrap();
    let target = dir_string(&temp, "db");

    let first = registry.get_or_create(&ClientOptions::memory("x")).unwrap();
    let second = registry
        .get_or_create(&ClientOptions::durable("x", target.as_str()))
        .unwrap();

    assert!(first.same_store(&second));
    assert!(second.handle().target().is_in_memory());
    // Nothing was opened at the ignored location
    assert!(!temp.path().join("db").exists());
}

#[test]
fn test_default_name_and_target_selection() {
    let registry = Registry::new();

    let anonymous = registry.get_or_create(&ClientOptions::default()).unwrap();
    assert_eq!(anonymous.name(), DEFAULT_STORE_NAME);
    assert!(anonymous.handle().target().is_in_memory());

    let named = registry
        .get_or_create(&ClientOptions::builder().name("default").build())
        .unwrap();
    assert!(named.same_store(&anonymous));
    assert!(registry.get("").is_some());
    assert!(registry.get("other").is_none());
}

#[test]
fn test_in_memory_flag_overrides_target() {
    let registry = Registry::new();
    let temp = TempDir::new().unwrap();

    let options = ClientOptions::builder()
        .name("flagged")
        .target(dir_string(&temp, "unused"))
        .in_memory(true)
        .build();
    let client = registry.get_or_create(&options).unwrap();

    assert_eq!(client.handle().target(), &StorageTarget::InMemory);
    assert!(!temp.path().join("unused").exists());
}

// =============================================================================
// Store-Open Failure Tests
// =============================================================================

#[test]
fn test_invalid_path_is_store_open_error() {
    let registry = Registry::new();
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain-file");
    fs::write(&file, b"x").unwrap();
    let target = file.join("db").to_string_lossy().into_owned();

    match registry.get_or_create(&ClientOptions::durable("broken", target.as_str())) {
        Err(StashError::StoreOpen { name, source, .. }) => {
            assert_eq!(name, "broken");
            assert!(matches!(*source, StashError::Io(_)));
        }
        other => panic!("expected StoreOpen, got {other:?}"),
    }

    // Failed opens leave no entry; the name is still free
    assert!(registry.is_empty());
    let retry = registry.get_or_create(&ClientOptions::memory("broken")).unwrap();
    assert!(retry.handle().target().is_in_memory());
}

#[test]
fn test_directory_cannot_back_two_names() {
    let registry = Registry::new();
    let temp = TempDir::new().unwrap();
    let target = dir_string(&temp, "shared");

    registry
        .get_or_create(&ClientOptions::durable("first", target.as_str()))
        .unwrap();
    let err = registry
        .get_or_create(&ClientOptions::durable("second", target.as_str()))
        .unwrap_err();

    match err {
        StashError::StoreOpen { name, source, .. } => {
            assert_eq!(name, "second");
            assert!(source.to_string().contains("first"));
        }
        other => panic!("expected StoreOpen, got {other:?}"),
    }
    assert_eq!(registry.names(), vec!["first".to_string()]);
}

#[test]
fn test_equivalent_paths_are_the_same_directory() {
    let registry = Registry::new();
    let temp = TempDir::new().unwrap();
    let plain = dir_string(&temp, "db");
    let dotted = temp.path().join(".").join("db").to_string_lossy().into_owned();

    registry
        .get_or_create(&ClientOptions::durable("one", plain.as_str()))
        .unwrap();
    let err = registry
        .get_or_create(&ClientOptions::durable("two", dotted.as_str()))
        .unwrap_err();

    assert!(matches!(err, StashError::StoreOpen { .. }));
}

#[test]
fn test_two_registries_cannot_share_a_directory() {
    let temp = TempDir::new().unwrap();
    let target = dir_string(&temp, "orders");
    let options = ClientOptions::durable("orders", target.as_str());

    let first = Registry::new();
    let orders = first.get_or_create(&options).unwrap();
    orders.set("k1", "v1").unwrap();

    let second = Registry::new();
    match second.get_or_create(&options) {
        Err(StashError::StoreOpen { name, source, .. }) => {
            assert_eq!(name, "orders");
            assert!(matches!(*source, StashError::Locked(_)));
        }
        other => panic!("expected StoreOpen, got {other:?}"),
    }
    assert!(second.is_empty());

    // Once the first engine is gone the directory opens normally
    drop(orders);
    drop(first);
    let reopened = second.get_or_create(&options).unwrap();
    assert_eq!(reopened.get("k1").unwrap(), Bytes::from("v1"));
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_durable_store_survives_registry() {
    let temp = TempDir::new().unwrap();
    let target = dir_string(&temp, "orders");
    {
        let registry = Registry::new();
        let orders = registry
            .get_or_create(&ClientOptions::durable("orders", target.as_str()))
            .unwrap();
        orders.set("a1", "100").unwrap();
        orders.set("a2", "200").unwrap();
        orders.pop("a2").unwrap();
        orders.set_with_ttl("a3", "300", 3600).unwrap();
    }

    let registry = Registry::new();
    let orders = registry
        .get_or_create(&ClientOptions::durable("orders", target.as_str()))
        .unwrap();

    assert!(!orders.handle().target().is_in_memory());
    let all = orders.view_prefix("").unwrap();
    let keys: Vec<&Bytes> = all.keys().collect();
    assert_eq!(keys, vec![&Bytes::from("a1"), &Bytes::from("a3")]);
}
