// crates/rulewarden-core/src/core/audit.rs
// ============================================================================
// Module: Rulewarden Audit Model
// Description: Append-only audit entries and their query filter.
// Purpose: Record every state transition with actor and snapshots.
// Dependencies: crate::core::{actor, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Every mutating operation appends exactly one audit entry inside the same
//! store transaction that performs the mutation. Entries are never updated or
//! deleted; reads filter by actor, action, table, record id, or time window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::actor::Actor;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Audit Action
// ============================================================================

/// Kind of state transition recorded in an audit entry.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row physically removed.
    Delete,
    /// Deactivation pipeline opened.
    RequestDeactivate,
    /// Deletion pipeline opened.
    RequestDelete,
    /// Approval row flipped to approved.
    Approve,
    /// Approval row flipped to rejected.
    Reject,
    /// Rule status changed by pipeline completion.
    StatusChange,
    /// Admin activated the rule bypassing approval.
    ForceActivate,
    /// Admin deactivated the rule bypassing approval.
    ForceDeactivate,
    /// Admin removed the rule bypassing approval.
    ForceDelete,
    /// Schedule row created.
    Schedule,
    /// Schedule row cancelled.
    CancelSchedule,
}

impl AuditAction {
    /// Returns the stable store form of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::RequestDeactivate => "REQUEST_DEACTIVATE",
            Self::RequestDelete => "REQUEST_DELETE",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::StatusChange => "STATUS_CHANGE",
            Self::ForceActivate => "FORCE_ACTIVATE",
            Self::ForceDeactivate => "FORCE_DEACTIVATE",
            Self::ForceDelete => "FORCE_DELETE",
            Self::Schedule => "SCHEDULE",
            Self::CancelSchedule => "CANCEL_SCHEDULE",
        }
    }

    /// Parses the stable store form of the action.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "REQUEST_DEACTIVATE" => Some(Self::RequestDeactivate),
            "REQUEST_DELETE" => Some(Self::RequestDelete),
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            "STATUS_CHANGE" => Some(Self::StatusChange),
            "FORCE_ACTIVATE" => Some(Self::ForceActivate),
            "FORCE_DEACTIVATE" => Some(Self::ForceDeactivate),
            "FORCE_DELETE" => Some(Self::ForceDelete),
            "SCHEDULE" => Some(Self::Schedule),
            "CANCEL_SCHEDULE" => Some(Self::CancelSchedule),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// Append-only audit record of one state transition.
///
/// # Invariants
/// - Committed in the same transaction as the mutation it records.
/// - Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Transition kind.
    pub action: AuditAction,
    /// Table the mutated row lives in.
    pub table_name: String,
    /// Identifier of the mutated row.
    pub record_id: i64,
    /// Actor that performed the mutation.
    pub actor: Actor,
    /// JSON snapshot before the mutation, when one existed.
    pub old_data: Option<Value>,
    /// JSON snapshot after the mutation, when one remains.
    pub new_data: Option<Value>,
    /// Transition timestamp.
    pub at: Timestamp,
}

impl AuditEntry {
    /// Creates an audit entry for the given transition.
    #[must_use]
    pub fn new(
        action: AuditAction,
        table_name: impl Into<String>,
        record_id: i64,
        actor: Actor,
        old_data: Option<Value>,
        new_data: Option<Value>,
        at: Timestamp,
    ) -> Self {
        Self {
            action,
            table_name: table_name.into(),
            record_id,
            actor,
            old_data,
            new_data,
            at,
        }
    }
}

// ============================================================================
// SECTION: Audit Query
// ============================================================================

/// Conjunctive filter for audit reads.
///
/// Unset fields match every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Filter by acting user.
    pub actor: Option<crate::core::identifiers::UserName>,
    /// Filter by transition kind.
    pub action: Option<AuditAction>,
    /// Filter by table name.
    pub table_name: Option<String>,
    /// Filter by mutated record identifier.
    pub record_id: Option<i64>,
    /// Inclusive lower bound on the transition timestamp.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on the transition timestamp.
    pub to: Option<Timestamp>,
}

impl AuditQuery {
    /// Returns whether the entry satisfies every set filter.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = &self.actor
            && entry.actor.user != *actor
        {
            return false;
        }
        if let Some(action) = self.action
            && entry.action != action
        {
            return false;
        }
        if let Some(table) = &self.table_name
            && entry.table_name != *table
        {
            return false;
        }
        if let Some(record_id) = self.record_id
            && entry.record_id != record_id
        {
            return false;
        }
        if let Some(from) = self.from
            && entry.at < from
        {
            return false;
        }
        if let Some(to) = self.to
            && entry.at > to
        {
            return false;
        }
        true
    }
}
