use std::time::Duration;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::store::StateStore;

fn test_key(kind: KeyKind, id: &str) -> StateKey {
    StateKey::new("test-ns", kind, id)
}

/// Run the full state store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn StateStore) -> Result<(), StateError> {
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_set_overwrites(store).await?;
    test_check_and_set_new(store).await?;
    test_check_and_set_existing(store).await?;
    test_delete(store).await?;
    test_increment(store).await?;
    test_ttl_set(store).await?;
    test_scan_keys(store).await?;
    test_timeout_index(store).await?;
    test_timeout_index_per_kind(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Content, "missing");
    let val = store.get(&key).await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_and_get(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Content, "set-get");
    store.set(&key, "hello", None).await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("hello"));
    Ok(())
}

async fn test_set_overwrites(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Token, "overwrite");
    store.set(&key, "first", None).await?;
    store.set(&key, "second", None).await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("second"), "last writer should win");
    Ok(())
}

async fn test_check_and_set_new(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Claim, "cas-new");
    let created = store.check_and_set(&key, "v1", None).await?;
    assert!(created, "check_and_set on new key should return true");
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"));
    Ok(())
}

async fn test_check_and_set_existing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Claim, "cas-existing");
    store.set(&key, "v1", None).await?;
    let created = store.check_and_set(&key, "v2", None).await?;
    assert!(!created, "check_and_set on existing key should return false");
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_delete(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Recipient, "to-delete");
    store.set(&key, "bye", None).await?;
    let existed = store.delete(&key).await?;
    assert!(existed, "delete should return true for existing key");
    let val = store.get(&key).await?;
    assert!(val.is_none(), "get after delete should return None");

    let existed = store.delete(&key).await?;
    assert!(!existed, "delete on missing key should return false");
    Ok(())
}

async fn test_increment(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Counter, "inc");
    let v = store.increment(&key, 1, None).await?;
    assert_eq!(v, 1);
    let v = store.increment(&key, 5, None).await?;
    assert_eq!(v, 6);
    let v = store.increment(&key, -2, None).await?;
    assert_eq!(v, 4);
    Ok(())
}

async fn test_ttl_set(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Claim, "ttl");
    store
        .set(&key, "ephemeral", Some(Duration::from_secs(60)))
        .await?;
    let val = store.get(&key).await?;
    assert_eq!(
        val.as_deref(),
        Some("ephemeral"),
        "value should be readable before TTL elapses"
    );
    Ok(())
}

async fn test_scan_keys(store: &dyn StateStore) -> Result<(), StateError> {
    store
        .set(&test_key(KeyKind::BatchMember, "b1:00000001"), "one", None)
        .await?;
    store
        .set(&test_key(KeyKind::BatchMember, "b1:00000002"), "two", None)
        .await?;
    store
        .set(&test_key(KeyKind::BatchMember, "b2:00000001"), "other", None)
        .await?;
    store
        .set(
            &StateKey::new("other-ns", KeyKind::BatchMember, "b1:00000003"),
            "foreign",
            None,
        )
        .await?;

    let mut found = store
        .scan_keys("test-ns", KeyKind::BatchMember, Some("b1:"))
        .await?;
    found.sort();
    assert_eq!(
        found,
        vec![
            (
                "test-ns:batch_member:b1:00000001".to_owned(),
                "one".to_owned()
            ),
            (
                "test-ns:batch_member:b1:00000002".to_owned(),
                "two".to_owned()
            ),
        ],
        "scan should honour namespace, kind and prefix"
    );

    let all = store
        .scan_keys("test-ns", KeyKind::BatchMember, None)
        .await?;
    assert_eq!(all.len(), 3);
    Ok(())
}

async fn test_timeout_index(store: &dyn StateStore) -> Result<(), StateError> {
    let early = test_key(KeyKind::Deletion, "early");
    let late = test_key(KeyKind::Deletion, "late");
    store.index_timeout(&early, 1_000).await?;
    store.index_timeout(&late, 5_000).await?;

    let due = store.get_expired_timeouts(KeyKind::Deletion, 1_000).await?;
    assert!(due.contains(&early.canonical()), "due key must be returned");
    assert!(!due.contains(&late.canonical()), "future key must not be returned");

    // Re-indexing moves the due time.
    store.index_timeout(&early, 9_000).await?;
    let due = store.get_expired_timeouts(KeyKind::Deletion, 6_000).await?;
    assert!(!due.contains(&early.canonical()));
    assert!(due.contains(&late.canonical()));

    store.remove_timeout_index(&early).await?;
    store.remove_timeout_index(&late).await?;
    let due = store.get_expired_timeouts(KeyKind::Deletion, i64::MAX).await?;
    assert!(!due.contains(&early.canonical()));
    assert!(!due.contains(&late.canonical()));
    Ok(())
}

async fn test_timeout_index_per_kind(store: &dyn StateStore) -> Result<(), StateError> {
    let token = test_key(KeyKind::Token, "indexed-token");
    let deletion = test_key(KeyKind::Deletion, "indexed-deletion");
    store.index_timeout(&token, 1_000).await?;
    store.index_timeout(&deletion, 1_000).await?;

    let deletions = store.get_expired_timeouts(KeyKind::Deletion, 2_000).await?;
    assert!(deletions.contains(&deletion.canonical()));
    assert!(
        !deletions.contains(&token.canonical()),
        "a range query must not read another kind's index"
    );

    let tokens = store.get_expired_timeouts(KeyKind::Token, 2_000).await?;
    assert!(tokens.contains(&token.canonical()));
    assert!(!tokens.contains(&deletion.canonical()));

    store.remove_timeout_index(&token).await?;
    store.remove_timeout_index(&deletion).await?;
    assert!(
        !store
            .get_expired_timeouts(KeyKind::Token, i64::MAX)
            .await?
            .contains(&token.canonical())
    );
    Ok(())
}
