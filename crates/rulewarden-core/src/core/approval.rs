// crates/rulewarden-core/src/core/approval.rs
// ============================================================================
// Module: Rulewarden Approval Model
// Description: Approval rows, action types, and the approver roster.
// Purpose: Define the multi-stage pipeline records gating rule transitions.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! An approval pipeline is an ordered list of stages; each stage holds one
//! pending row per registered approver of a business group, and the terminal
//! stage holds the configured final approver. The active stage is the minimum
//! stage index with any pending row; the pipeline is complete when no pending
//! row remains. Stage layout is a pure function of the roster and the
//! impacted groups, which keeps pipeline rebuilds idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Group name of the always-present terminal approval stage.
pub const FINAL_STAGE_GROUP: &str = "FINAL";

// ============================================================================
// SECTION: Approval Enums
// ============================================================================

/// Action type a pipeline gates.
///
/// # Invariants
/// - Constant across every row of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Gate a create or update entering the active state.
    CreateOrUpdate,
    /// Gate a deactivation.
    Deactivate,
    /// Gate a physical deletion.
    Delete,
}

impl ActionType {
    /// Returns the stable store form of the action type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateOrUpdate => "CREATE_OR_UPDATE",
            Self::Deactivate => "DEACTIVATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parses the stable store form of the action type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATE_OR_UPDATE" => Some(Self::CreateOrUpdate),
            "DEACTIVATE" => Some(Self::Deactivate),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Per-approver decision flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovedFlag {
    /// Awaiting a decision.
    Pending,
    /// Approved by the assignee.
    Approved,
    /// Rejected by the assignee.
    Rejected,
}

impl ApprovedFlag {
    /// Returns the stable numeric store form of the flag.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Approved => 1,
            Self::Rejected => 2,
        }
    }

    /// Parses the stable numeric store form of the flag.
    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Approved),
            2 => Some(Self::Rejected),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Approval Row
// ============================================================================

/// Single approver assignment within a pipeline stage.
///
/// # Invariants
/// - `stage` indices are contiguous starting at 1 within a pipeline.
/// - `action_type` is constant across a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRow {
    /// Rule the pipeline gates.
    pub rule_id: RuleId,
    /// Business group of the stage.
    pub group_name: GroupName,
    /// Assigned approver.
    pub username: UserName,
    /// Decision flag.
    pub approved_flag: ApprovedFlag,
    /// One-based stage index.
    pub approval_stage: u32,
    /// Action type the pipeline gates.
    pub action_type: ActionType,
    /// Decision timestamp, set when the flag leaves pending.
    pub decided_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Approver Roster
// ============================================================================

/// Registered approvers and stage ordering used to build pipelines.
///
/// # Invariants
/// - `stage_order` lists business groups in fixed base order; the terminal
///   [`FINAL_STAGE_GROUP`] stage is implicit and always emitted last.
/// - Every group in `stage_order` has at least one registered approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRoster {
    /// Fixed base order of business-group stages.
    pub stage_order: Vec<GroupName>,
    /// Registered approvers per business group.
    pub approvers: BTreeMap<GroupName, Vec<UserName>>,
    /// Identity approving the terminal stage.
    pub final_approver: UserName,
}

impl ApprovalRoster {
    /// Builds the stage rows for a pipeline over the impacted groups.
    ///
    /// Stages are emitted for each base-order group present in
    /// `impacted_groups`, then the terminal stage, with contiguous indices
    /// starting at 1. Groups without registered approvers are skipped.
    #[must_use]
    pub fn stage_rows(
        &self,
        rule_id: RuleId,
        impacted_groups: &BTreeSet<GroupName>,
        action_type: ActionType,
    ) -> Vec<ApprovalRow> {
        let mut rows = Vec::new();
        let mut stage: u32 = 0;
        for group in &self.stage_order {
            if !impacted_groups.contains(group) {
                continue;
            }
            let Some(users) = self.approvers.get(group) else {
                continue;
            };
            if users.is_empty() {
                continue;
            }
            stage += 1;
            for user in users {
                rows.push(ApprovalRow {
                    rule_id,
                    group_name: group.clone(),
                    username: user.clone(),
                    approved_flag: ApprovedFlag::Pending,
                    approval_stage: stage,
                    action_type,
                    decided_at: None,
                });
            }
        }
        stage += 1;
        rows.push(ApprovalRow {
            rule_id,
            group_name: GroupName::new(FINAL_STAGE_GROUP),
            username: self.final_approver.clone(),
            approved_flag: ApprovedFlag::Pending,
            approval_stage: stage,
            action_type,
            decided_at: None,
        });
        rows
    }
}

// ============================================================================
// SECTION: Stage Arithmetic
// ============================================================================

/// Returns the minimum stage index holding any pending row.
#[must_use]
pub fn min_pending_stage(rows: &[ApprovalRow]) -> Option<u32> {
    rows.iter()
        .filter(|row| row.approved_flag == ApprovedFlag::Pending)
        .map(|row| row.approval_stage)
        .min()
}

/// Returns whether the pipeline has no pending rows left.
#[must_use]
pub fn is_complete(rows: &[ApprovalRow]) -> bool {
    min_pending_stage(rows).is_none()
}
