// crates/rulewarden-core/tests/locks_unit.rs
// ============================================================================
// Module: Lock Manager Unit Tests
// Description: Acquire, conflict, expiry, force-acquire, and release paths.
// Purpose: Validate single-writer semantics and lazy TTL expiry.
// ============================================================================

//! Lock manager tests over the in-memory store.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::admin;
use common::draft;
use common::harness;
use common::operator;
use common::ts;
use rulewarden_core::Actor;
use rulewarden_core::EngineError;

#[test]
fn acquire_then_conflict_then_release() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let lock = h.engine.acquire_lock(rule.rule_id, &operator(), Some(60_000), ts(2_000)).unwrap();
    assert_eq!(lock.locked_by.as_str(), "alice");
    assert!(!lock.force_lock);

    let err = h
        .engine
        .acquire_lock(rule.rule_id, &Actor::new("bob", "BG2"), Some(60_000), ts(3_000))
        .unwrap_err();
    match err {
        EngineError::LockConflict {
            holder,
            expires_at,
            ..
        } => {
            assert_eq!(holder.as_str(), "alice");
            assert_eq!(expires_at, ts(62_000));
        }
        other => panic!("expected LockConflict, got {other:?}"),
    }

    h.engine.release_lock(rule.rule_id, &operator(), ts(4_000)).unwrap();
    assert!(h.engine.lock_owner(rule.rule_id, ts(5_000)).unwrap().is_none());
}

#[test]
fn expired_locks_are_treated_as_absent() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    h.engine.acquire_lock(rule.rule_id, &operator(), Some(1_000), ts(2_000)).unwrap();
    // Past the TTL the rule reads as unlocked and a new owner can take it.
    assert!(h.engine.lock_owner(rule.rule_id, ts(4_000)).unwrap().is_none());
    let lock = h
        .engine
        .acquire_lock(rule.rule_id, &Actor::new("bob", "BG2"), Some(1_000), ts(4_001))
        .unwrap();
    assert_eq!(lock.locked_by.as_str(), "bob");
}

#[test]
fn force_acquire_is_admin_only_and_preempts() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    h.engine.acquire_lock(rule.rule_id, &operator(), Some(60_000), ts(2_000)).unwrap();

    let err = h
        .engine
        .force_acquire_lock(rule.rule_id, &Actor::new("bob", "BG2"), None, ts(3_000))
        .unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));

    let lock = h.engine.force_acquire_lock(rule.rule_id, &admin(), None, ts(3_500)).unwrap();
    assert_eq!(lock.locked_by.as_str(), "root");
    assert!(lock.force_lock);

    let owner = h.engine.lock_owner(rule.rule_id, ts(4_000)).unwrap();
    assert_eq!(owner.unwrap().0.as_str(), "root");
}

#[test]
fn force_acquire_then_release_returns_to_unheld() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    h.engine.acquire_lock(rule.rule_id, &operator(), Some(60_000), ts(2_000)).unwrap();

    h.engine.force_acquire_lock(rule.rule_id, &admin(), None, ts(3_000)).unwrap();
    h.engine.release_lock(rule.rule_id, &admin(), ts(4_000)).unwrap();
    assert!(h.engine.lock_owner(rule.rule_id, ts(5_000)).unwrap().is_none());
}

#[test]
fn release_requires_owner_or_admin() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    h.engine.acquire_lock(rule.rule_id, &operator(), Some(60_000), ts(2_000)).unwrap();

    let err = h
        .engine
        .release_lock(rule.rule_id, &Actor::new("bob", "BG2"), ts(3_000))
        .unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));

    // Admin may release someone else's lock.
    h.engine.release_lock(rule.rule_id, &admin(), ts(4_000)).unwrap();
}

#[test]
fn acquiring_a_lock_on_a_missing_rule_fails() {
    let h = harness();
    let err = h
        .engine
        .acquire_lock(rulewarden_core::RuleId::new(404), &operator(), None, ts(1_000))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn default_ttl_applies_when_none_is_given() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let lock = h.engine.acquire_lock(rule.rule_id, &operator(), None, ts(2_000)).unwrap();
    let default_ttl = h.engine.settings().default_lock_ttl_ms;
    assert_eq!(lock.expires_at, ts(2_000 + default_ttl));
}
