// crates/rulewarden-core/src/runtime/locks.rs
// ============================================================================
// Module: Rulewarden Lock Manager
// Description: Pessimistic per-rule edit locks with TTL and admin override.
// Purpose: Enforce single-writer semantics on rules under edit.
// Dependencies: crate::{core, interfaces, runtime::engine}
// ============================================================================

//! ## Overview
//! Lock acquisition is a single atomic store round-trip; callers never wait.
//! Expiry is evaluated against the caller-supplied time on every access, so
//! an expired lock is indistinguishable from no lock. Lifecycle mutation
//! paths require a live lock unless the caller is an admin.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::actor::Actor;
use crate::core::error::EngineError;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserName;
use crate::core::lock::RuleLock;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::LockAttempt;
use crate::interfaces::Notifier;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::Store;
use crate::runtime::engine::Engine;

// ============================================================================
// SECTION: Lock Operations
// ============================================================================

impl<S, B, A, N> Engine<S, B, A, N>
where
    S: Store,
    B: ExecutionBackend,
    A: SqlAnalyzer,
    N: Notifier,
{
    /// Acquires the edit lock on a rule.
    ///
    /// A `ttl_ms` of `None` uses the configured default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockConflict`] when another user holds a live
    /// lock, and [`EngineError::NotFound`] when the rule does not exist.
    pub fn acquire_lock(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        ttl_ms: Option<i64>,
        now: Timestamp,
    ) -> Result<RuleLock, EngineError> {
        self.rule(rule_id)?;
        let lock = self.new_lock(rule_id, &actor.user, ttl_ms, false, now);
        match self.store.try_acquire_lock(&lock, now, false)? {
            LockAttempt::Acquired(acquired) => Ok(acquired),
            LockAttempt::HeldBy {
                owner,
                expires_at,
            } => Err(EngineError::LockConflict {
                rule_id,
                holder: owner,
                expires_at,
            }),
        }
    }

    /// Acquires the edit lock, deactivating any existing lock first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccessDenied`] when the caller is not an admin.
    pub fn force_acquire_lock(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        ttl_ms: Option<i64>,
        now: Timestamp,
    ) -> Result<RuleLock, EngineError> {
        if !actor.is_admin(&self.settings.admin_group) {
            return Err(EngineError::AccessDenied(format!(
                "force-acquire on rule {rule_id} requires the {} group",
                self.settings.admin_group
            )));
        }
        self.rule(rule_id)?;
        let lock = self.new_lock(rule_id, &actor.user, ttl_ms, true, now);
        match self.store.try_acquire_lock(&lock, now, true)? {
            LockAttempt::Acquired(acquired) => Ok(acquired),
            LockAttempt::HeldBy {
                owner,
                expires_at,
            } => Err(EngineError::LockConflict {
                rule_id,
                holder: owner,
                expires_at,
            }),
        }
    }

    /// Releases the lock on a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccessDenied`] when the caller is neither the
    /// owner nor an admin, and [`EngineError::NotFound`] when no live lock
    /// exists.
    pub fn release_lock(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let Some(lock) = self.store.active_lock(rule_id, now)? else {
            return Err(EngineError::NotFound(format!("active lock on rule {rule_id}")));
        };
        if lock.locked_by != actor.user && !actor.is_admin(&self.settings.admin_group) {
            return Err(EngineError::AccessDenied(format!(
                "lock on rule {rule_id} is owned by {}",
                lock.locked_by
            )));
        }
        self.store.release_lock(rule_id)?;
        Ok(())
    }

    /// Returns the current lock owner and expiry, when a live lock exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the read fails.
    pub fn lock_owner(
        &self,
        rule_id: RuleId,
        now: Timestamp,
    ) -> Result<Option<(UserName, Timestamp)>, EngineError> {
        Ok(self
            .store
            .active_lock(rule_id, now)?
            .map(|lock| (lock.locked_by, lock.expires_at)))
    }

    /// Rejects mutation paths unless the caller is an admin or holds a live
    /// lock on the rule.
    pub(crate) fn ensure_lock_or_admin(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if actor.is_admin(&self.settings.admin_group) {
            return Ok(());
        }
        match self.store.active_lock(rule_id, now)? {
            Some(lock) if lock.locked_by == actor.user => Ok(()),
            Some(lock) => Err(EngineError::LockConflict {
                rule_id,
                holder: lock.locked_by,
                expires_at: lock.expires_at,
            }),
            None => Err(EngineError::AccessDenied(format!(
                "mutating rule {rule_id} requires holding its edit lock"
            ))),
        }
    }

    /// Builds a lock row for an acquisition attempt.
    fn new_lock(
        &self,
        rule_id: RuleId,
        user: &UserName,
        ttl_ms: Option<i64>,
        force: bool,
        now: Timestamp,
    ) -> RuleLock {
        let ttl = ttl_ms.unwrap_or(self.settings.default_lock_ttl_ms);
        RuleLock {
            rule_id,
            locked_by: user.clone(),
            acquired_at: now,
            expires_at: now.saturating_add_millis(ttl),
            force_lock: force,
            active: true,
        }
    }
}
