// crates/rulewarden-core/src/runtime/approvals.rs
// ============================================================================
// Module: Rulewarden Approval State Machine
// Description: Pipeline construction, progression, and completion handling.
// Purpose: Gate rule transitions behind multi-stage group approvals.
// Dependencies: crate::{core, interfaces, runtime::engine}
// ============================================================================

//! ## Overview
//! Pipelines are keyed by `(rule, action_type)` and rebuilt idempotently:
//! opening a pipeline deletes any prior rows for the same key first. Only
//! pending rows in the minimum pending stage are actionable; the UI filters
//! on this, and the state machine enforces it too. Completion hands off to
//! the per-action lifecycle handler, which records the resulting status
//! change in its own audit entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::actor::Actor;
use crate::core::approval::ActionType;
use crate::core::approval::ApprovalRow;
use crate::core::approval::ApprovedFlag;
use crate::core::approval::min_pending_stage;
use crate::core::audit::AuditAction;
use crate::core::audit::AuditEntry;
use crate::core::error::EngineError;
use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::rule::ApprovalStatus;
use crate::core::rule::LifecycleState;
use crate::core::rule::Rule;
use crate::core::rule::RuleStatus;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::Notifier;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::Store;
use crate::runtime::engine::Engine;
use crate::runtime::lifecycle::RULES_TABLE;
use crate::runtime::lifecycle::rule_snapshot;

// ============================================================================
// SECTION: Pipeline Construction
// ============================================================================

impl<S, B, A, N> Engine<S, B, A, N>
where
    S: Store,
    B: ExecutionBackend,
    A: SqlAnalyzer,
    N: Notifier,
{
    /// Opens (or idempotently rebuilds) the pipeline for a rule and action.
    pub(crate) fn open_pipeline(
        &self,
        rule: &Rule,
        action_type: ActionType,
    ) -> Result<(), EngineError> {
        let impacted = self.impacted_groups(rule)?;
        let rows = self.roster.stage_rows(rule.rule_id, &impacted, action_type);
        self.store.replace_approvals(rule.rule_id, action_type, &rows)?;
        Ok(())
    }

    /// Computes the impacted business groups for a rule: its own owner group
    /// plus the owner groups of every rule reachable outward over hierarchy
    /// and column-mapping edges.
    ///
    /// The column-mapping store may be absent; traversal then degrades to
    /// hierarchy only.
    fn impacted_groups(&self, rule: &Rule) -> Result<BTreeSet<GroupName>, EngineError> {
        let mappings = self.store.column_mappings()?;
        let mut groups = BTreeSet::new();
        groups.insert(rule.owner_group.clone());

        let mut visited = BTreeSet::new();
        let mut frontier = vec![rule.rule_id];
        while let Some(current) = frontier.pop() {
            if !visited.insert(current) {
                continue;
            }
            for child in self.store.children_of(current)? {
                groups.insert(child.owner_group.clone());
                frontier.push(child.rule_id);
            }
            for mapping in mappings.iter().filter(|m| m.rule_id == current) {
                if let Some(mapped) = self.store.rule(mapping.mapped_rule_id)? {
                    groups.insert(mapped.owner_group.clone());
                    frontier.push(mapped.rule_id);
                }
            }
        }
        Ok(groups)
    }

    /// Lists the pipeline rows for a rule and action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the read fails.
    pub fn approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
    ) -> Result<Vec<ApprovalRow>, EngineError> {
        Ok(self.store.approvals(rule_id, action_type)?)
    }

    // ------------------------------------------------------------------
    // Progression
    // ------------------------------------------------------------------

    /// Approves the caller's pending row in the current stage.
    ///
    /// When the pipeline completes, the action-specific completion handler
    /// runs and the rule transitions accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when no matching pending row exists
    /// and [`EngineError::InvariantViolation`] when the row is not in the
    /// current stage.
    pub fn approve(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
        group: &GroupName,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let rule = self.rule(rule_id)?;
        ensure_pipeline_open(&rule)?;
        let rows = self.store.approvals(rule_id, action_type)?;
        let row = actionable_row(&rows, group, actor, rule_id)?;

        let mut decided = row.clone();
        decided.approved_flag = ApprovedFlag::Approved;
        decided.decided_at = Some(now);

        let complete = pipeline_completes(&rows, &decided);
        let interim = progressed_rule(&rule, action_type, complete, actor, now);
        let audit = AuditEntry::new(
            AuditAction::Approve,
            RULES_TABLE,
            rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(&rule)),
            Some(rule_snapshot(&interim)),
            now,
        );
        self.store.apply_approval(&interim, &decided, &audit)?;

        if complete {
            return self.complete_pipeline(&interim, action_type, actor, now);
        }
        Ok(interim)
    }

    /// Rejects the caller's pending row, abandoning the pipeline.
    ///
    /// Remaining pending rows are preserved for audit but have no further
    /// effect.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when no matching pending row exists.
    pub fn reject(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
        group: &GroupName,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let rule = self.rule(rule_id)?;
        ensure_pipeline_open(&rule)?;
        let rows = self.store.approvals(rule_id, action_type)?;
        let row = actionable_row(&rows, group, actor, rule_id)?;

        let mut decided = row.clone();
        decided.approved_flag = ApprovedFlag::Rejected;
        decided.decided_at = Some(now);

        let mut rejected = rule.clone();
        rejected.status = RuleStatus::Inactive;
        rejected.approval_status = ApprovalStatus::Rejected;
        rejected.lifecycle_state = LifecycleState::Inactive;
        rejected.version += 1;
        rejected.updated_by = actor.user.clone();
        rejected.updated_at = now;

        let audit = AuditEntry::new(
            AuditAction::Reject,
            RULES_TABLE,
            rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(&rule)),
            Some(rule_snapshot(&rejected)),
            now,
        );
        self.store.apply_approval(&rejected, &decided, &audit)?;
        Ok(rejected)
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Applies the action-specific transition once no pending row remains.
    fn complete_pipeline(
        &self,
        rule: &Rule,
        action_type: ActionType,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        match action_type {
            ActionType::CreateOrUpdate => {
                self.finish_transition(rule, RuleStatus::Active, LifecycleState::Active, actor, now)
            }
            ActionType::Deactivate => self.finish_transition(
                rule,
                RuleStatus::Inactive,
                LifecycleState::Inactive,
                actor,
                now,
            ),
            ActionType::Delete => {
                let audit = AuditEntry::new(
                    AuditAction::Delete,
                    RULES_TABLE,
                    rule.rule_id.as_i64(),
                    actor.clone(),
                    Some(rule_snapshot(rule)),
                    None,
                    now,
                );
                self.store.remove_rule(rule.rule_id, &audit)?;
                Ok(rule.clone())
            }
        }
    }

    /// Writes the completed-state rule with a status-change audit entry.
    fn finish_transition(
        &self,
        rule: &Rule,
        status: RuleStatus,
        lifecycle_state: LifecycleState,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let mut finished = rule.clone();
        finished.status = status;
        finished.approval_status = ApprovalStatus::Approved;
        finished.lifecycle_state = lifecycle_state;
        finished.version += 1;
        finished.updated_by = actor.user.clone();
        finished.updated_at = now;

        let audit = AuditEntry::new(
            AuditAction::StatusChange,
            RULES_TABLE,
            rule.rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(rule)),
            Some(rule_snapshot(&finished)),
            now,
        );
        self.store.update_rule(&finished, None, &audit)?;
        Ok(finished)
    }
}

// ============================================================================
// SECTION: Progression Helpers
// ============================================================================

/// Refuses decisions on a pipeline abandoned by rejection.
fn ensure_pipeline_open(rule: &Rule) -> Result<(), EngineError> {
    if rule.approval_status == ApprovalStatus::Rejected {
        return Err(EngineError::InvariantViolation(format!(
            "approval pipeline for rule {} was rejected; retrigger the action to reopen it",
            rule.rule_id
        )));
    }
    Ok(())
}

/// Finds the caller's pending row and enforces current-stage actionability.
fn actionable_row<'rows>(
    rows: &'rows [ApprovalRow],
    group: &GroupName,
    actor: &Actor,
    rule_id: RuleId,
) -> Result<&'rows ApprovalRow, EngineError> {
    let Some(current_stage) = min_pending_stage(rows) else {
        return Err(EngineError::NotFound(format!(
            "open approval pipeline for rule {rule_id}"
        )));
    };
    let row = rows
        .iter()
        .find(|row| {
            row.approved_flag == ApprovedFlag::Pending
                && row.group_name == *group
                && row.username == actor.user
        })
        .ok_or_else(|| {
            EngineError::NotFound(format!(
                "pending approval for {} in group {group} on rule {rule_id}",
                actor.user
            ))
        })?;
    if row.approval_stage != current_stage {
        return Err(EngineError::InvariantViolation(format!(
            "approval stage {} on rule {rule_id} is not the current stage {current_stage}",
            row.approval_stage
        )));
    }
    Ok(row)
}

/// Returns whether flipping `decided` leaves no pending row.
fn pipeline_completes(rows: &[ApprovalRow], decided: &ApprovalRow) -> bool {
    rows.iter()
        .filter(|row| row.approved_flag == ApprovedFlag::Pending)
        .all(|row| {
            row.group_name == decided.group_name
                && row.username == decided.username
                && row.approval_stage == decided.approval_stage
        })
}

/// Builds the rule state written alongside a non-final or final approve.
fn progressed_rule(
    rule: &Rule,
    action_type: ActionType,
    complete: bool,
    actor: &Actor,
    now: Timestamp,
) -> Rule {
    let mut interim = rule.clone();
    if !complete && action_type == ActionType::CreateOrUpdate {
        interim.status = RuleStatus::Inactive;
        interim.approval_status = ApprovalStatus::ApprovalInProgress;
        interim.lifecycle_state = LifecycleState::UnderApproval;
    }
    interim.version += 1;
    interim.updated_by = actor.user.clone();
    interim.updated_at = now;
    interim
}
