// crates/rulewarden-core/src/core/lock.rs
// ============================================================================
// Module: Rulewarden Lock Model
// Description: Pessimistic per-rule edit lock row.
// Purpose: Define the single-writer claim record with TTL semantics.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! At most one active lock exists per rule. Expiry is evaluated against the
//! caller-supplied time on every access; expired locks are treated as absent
//! and lazily deactivated by the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Lock Row
// ============================================================================

/// Pessimistic edit lock on a rule.
///
/// # Invariants
/// - At most one row per rule is active and unexpired at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLock {
    /// Locked rule.
    pub rule_id: RuleId,
    /// Lock owner.
    pub locked_by: UserName,
    /// Acquisition timestamp.
    pub acquired_at: Timestamp,
    /// Expiry timestamp.
    pub expires_at: Timestamp,
    /// Whether the lock was taken via admin force-acquire.
    pub force_lock: bool,
    /// Whether the lock is active.
    pub active: bool,
}

impl RuleLock {
    /// Returns whether the lock has expired at the given time.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }

    /// Returns whether the lock is live (active and unexpired) at the given
    /// time.
    #[must_use]
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.active && !self.is_expired(now)
    }
}
