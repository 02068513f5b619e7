// crates/rulewarden-core/src/core/error.rs
// ============================================================================
// Module: Rulewarden Engine Errors
// Description: Error taxonomy surfaced by engine operations.
// Purpose: Give every rejected operation a stable, human-readable kind.
// Dependencies: crate::core::{identifiers, time}, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! Every rejected operation produces an error naming the rule involved; no
//! partial state is ever committed. Store failures roll back the entire
//! transaction, audit entry included, before surfacing here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserName;
use crate::core::time::Timestamp;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Engine Error
// ============================================================================

/// Errors surfaced by engine operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced rule, schedule, or approval does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// `(owner_group, rule_name)` collision.
    #[error("duplicate rule name {name} in group {owner_group}")]
    DuplicateName {
        /// Group the colliding name belongs to.
        owner_group: GroupName,
        /// Colliding rule name.
        name: String,
    },
    /// Caller lacks the privilege the operation requires.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// Operation would violate a lifecycle invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Rule is locked by another user.
    #[error("rule {rule_id} locked by {holder} until {expires_at}")]
    LockConflict {
        /// Locked rule.
        rule_id: RuleId,
        /// Current lock owner.
        holder: UserName,
        /// Lock expiry timestamp.
        expires_at: Timestamp,
    },
    /// Backing database failure.
    #[error("backend error: {0}")]
    Backend(String),
    /// One or more data validations failed for the rule's tables.
    #[error("validation failed for rule {rule_id}: {message}")]
    ValidationFailed {
        /// Gated rule.
        rule_id: RuleId,
        /// Aggregate failure description.
        message: String,
    },
    /// The rule's SQL returned a non-pass value or raised.
    #[error("execution failed for rule {rule_id}: {message}")]
    ExecutionFailed {
        /// Failing rule.
        rule_id: RuleId,
        /// Failure description.
        message: String,
    },
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
