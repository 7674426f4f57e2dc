//! Tests for Client operations
//!
//! These tests verify:
//! - Set/Get, overwrite, and the empty value
//! - TTL expiry, including a zero TTL
//! - Pop and PopFirst remove exactly what they return
//! - Delete is idempotent
//! - ViewPrefix ordering and boundaries

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use stashkv::{Client, StashError};

use super::memory_client;

fn b(v: &str) -> Bytes {
    Bytes::copy_from_slice(v.as_bytes())
}

fn assert_not_found(client: &Client, key: &str) {
    match client.get(key) {
        Err(StashError::KeyNotFound(k)) => assert_eq!(k, key),
        other => panic!("expected KeyNotFound for {key}, got {other:?}"),
    }
}

// =============================================================================
// Scenario
// =============================================================================

#[test]
fn test_orders_scenario() {
    let (_registry, orders) = memory_client("orders");

    orders.set("a1", "100").unwrap();
    orders.set_with_ttl("a2", "200", 0).unwrap();

    assert_eq!(orders.get("a1").unwrap(), b("100"));
    assert_not_found(&orders, "a2");

    let view = orders.view_prefix("a").unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.get(&b("a1")), Some(&b("100")));
}

// =============================================================================
// Set / Get Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let (_registry, client) = memory_client("kv");

    for (k, v) in [("alpha", "1"), ("beta", "two"), ("γ", "三")] {
        client.set(k, v).unwrap();
        assert_eq!(client.get(k).unwrap(), b(v));
    }
}

#[test]
fn test_set_overwrites() {
    let (_registry, client) = memory_client("kv");

    client.set("k", "first").unwrap();
    client.set("k", "second").unwrap();

    assert_eq!(client.get("k").unwrap(), b("second"));
}

#[test]
fn test_get_missing_key() {
    let (_registry, client) = memory_client("kv");
    assert_not_found(&client, "nope");
}

#[test]
fn test_empty_value_is_a_real_value() {
    let (_registry, client) = memory_client("kv");

    client.set("blank", "").unwrap();

    // Present-but-empty is distinct from absent
    assert_eq!(client.get("blank").unwrap(), Bytes::new());
    assert_eq!(client.view_prefix("").unwrap().len(), 1);
    assert_eq!(client.pop("blank").unwrap(), Bytes::new());
    assert_not_found(&client, "blank");
}

#[test]
fn test_binary_keys_and_values() {
    let (_registry, client) = memory_client("kv");
    let key = [0u8, 255, 1];
    let value = [9u8, 0, 9];

    client.set(key, value).unwrap();

    assert_eq!(&client.get(key).unwrap()[..], &value[..]);
}

// =============================================================================
// TTL Tests
// =============================================================================

#[test]
fn test_zero_ttl_expires_immediately() {
    let (_registry, client) = memory_client("kv");

    client.set_with_ttl("k", "v", 0).unwrap();

    assert_not_found(&client, "k");
    assert!(client.view_prefix("").unwrap().is_empty());
}

#[test]
fn test_ttl_expires_after_window() {
    let (_registry, client) = memory_client("kv");

    client.set_with_ttl("k", "v", 1).unwrap();
    assert_eq!(client.get("k").unwrap(), b("v"));

    thread::sleep(Duration::from_millis(1100));
    assert_not_found(&client, "k");
}

#[test]
fn test_set_clears_previous_ttl() {
    let (_registry, client) = memory_client("kv");

    client.set_with_ttl("k", "v", 0).unwrap();
    client.set("k", "forever").unwrap();

    assert_eq!(client.get("k").unwrap(), b("forever"));
}

#[test]
fn test_pop_of_expired_key_is_not_found() {
    let (_registry, client) = memory_client("kv");

    client.set_with_ttl("k", "v", 0).unwrap();

    assert!(client.pop("k").unwrap_err().is_not_found());
}

// =============================================================================
// Pop Tests
// =============================================================================

#[test]
fn test_pop_returns_value_and_removes_key() {
    let (_registry, client) = memory_client("kv");
    client.set("job", "payload").unwrap();

    assert_eq!(client.pop("job").unwrap(), b("payload"));
    assert_not_found(&client, "job");
    assert!(client.pop("job").unwrap_err().is_not_found());
}

#[test]
fn test_pop_first_takes_smallest_key() {
    let (_registry, client) = memory_client("queue");
    for key in ["m", "b", "x", "a2", "a10"] {
        client.set(key, "v").unwrap();
    }

    // Byte order, not numeric order
    assert_eq!(client.pop_first().unwrap(), b("a10"));
    assert_eq!(client.pop_first().unwrap(), b("a2"));

    let left: Vec<Bytes> = client.view_prefix("").unwrap().into_keys().collect();
    assert_eq!(left, vec![b("b"), b("m"), b("x")]);
}

#[test]
fn test_pop_first_on_empty_store() {
    let (_registry, client) = memory_client("queue");

    assert!(matches!(client.pop_first(), Err(StashError::EmptyStore)));

    client.set("only", "1").unwrap();
    assert_eq!(client.pop_first().unwrap(), b("only"));
    assert!(matches!(client.pop_first(), Err(StashError::EmptyStore)));
}

#[test]
fn test_pop_first_skips_expired_keys() {
    let (_registry, client) = memory_client("queue");
    client.set_with_ttl("a", "stale", 0).unwrap();
    client.set("b", "live").unwrap();

    assert_eq!(client.pop_first().unwrap(), b("b"));
    assert!(matches!(client.pop_first(), Err(StashError::EmptyStore)));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_is_idempotent() {
    let (_registry, client) = memory_client("kv");

    client.delete("never-set").unwrap();

    client.set("k", "v").unwrap();
    client.delete("k").unwrap();
    assert_not_found(&client, "k");
    client.delete("k").unwrap();
    assert_not_found(&client, "k");
}

// =============================================================================
// ViewPrefix Tests
// =============================================================================

#[test]
fn test_view_prefix_bounds() {
    let (_registry, client) = memory_client("kv");
    for key in ["user:1", "user:2", "user", "users:9", "usa", "order:1"] {
        client.set(key, key.to_uppercase()).unwrap();
    }

    let users: Vec<Bytes> = client.view_prefix("user:").unwrap().into_keys().collect();
    assert_eq!(users, vec![b("user:1"), b("user:2")]);

    let us: Vec<Bytes> = client.view_prefix("us").unwrap().into_keys().collect();
    assert_eq!(us, vec![b("usa"), b("user"), b("user:1"), b("user:2"), b("users:9")]);

    assert!(client.view_prefix("zzz").unwrap().is_empty());
}

#[test]
fn test_view_prefix_empty_is_full_dump() {
    let (_registry, client) = memory_client("kv");
    client.set("b", "2").unwrap();
    client.set("a", "1").unwrap();
    client.set_with_ttl("c", "3", 0).unwrap();
    client.set("d", "4").unwrap();
    client.delete("d").unwrap();

    let all = client.view_prefix("").unwrap();

    assert_eq!(
        all.into_iter().collect::<Vec<_>>(),
        vec![(b("a"), b("1")), (b("b"), b("2"))]
    );
}

// =============================================================================
// Error Shape Tests
// =============================================================================

#[test]
fn test_engine_errors_name_the_operation() {
    let (_registry, client) = memory_client("kv");
    client.set("k", "v").unwrap();

    let err = client
        .show_with(|_, _| Err(StashError::Sink("broken pipe".into())))
        .unwrap_err();

    assert!(!err.is_not_found());
    assert!(err.to_string().contains("show"));
    assert!(err.to_string().contains("broken pipe"));
}
