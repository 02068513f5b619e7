// crates/rulewarden-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: Rulewarden Rule Lifecycle
// Description: Create, update, deactivate, delete, and the admin force paths.
// Purpose: Enforce lifecycle invariants and open approval pipelines.
// Dependencies: crate::{core, interfaces, runtime::{approvals, engine, locks}}
// ============================================================================

//! ## Overview
//! Every lifecycle mutation follows the same shape: authorize, guard
//! invariants, refresh analysis where SQL changed, write the rule with its
//! audit entry in one store transaction, then open the gating pipeline.
//! Notification delivery is best effort and never fails the mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::actor::Actor;
use crate::core::approval::ActionType;
use crate::core::audit::AuditAction;
use crate::core::audit::AuditEntry;
use crate::core::error::EngineError;
use crate::core::identifiers::RuleId;
use crate::core::rule::ApprovalStatus;
use crate::core::rule::ColumnOp;
use crate::core::rule::LifecycleState;
use crate::core::rule::Rule;
use crate::core::rule::RuleDraft;
use crate::core::rule::RuleStatus;
use crate::core::rule::TableDependency;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::Notifier;
use crate::interfaces::SqlAnalysis;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::Store;
use crate::runtime::engine::Engine;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audit table name for rule rows.
pub(crate) const RULES_TABLE: &str = "BRM_RULES";
/// Audit table name for schedule rows.
pub(crate) const SCHEDULES_TABLE: &str = "RULE_SCHEDULES";

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Serializes a rule for an audit snapshot.
pub(crate) fn rule_snapshot(rule: &Rule) -> Value {
    serde_json::to_value(rule).unwrap_or(Value::Null)
}

/// Renders a rule-id list for operator-facing messages.
fn id_list(ids: &[RuleId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Lifecycle Operations
// ============================================================================

impl<S, B, A, N> Engine<S, B, A, N>
where
    S: Store,
    B: ExecutionBackend,
    A: SqlAnalyzer,
    N: Notifier,
{
    /// Creates a rule in the inactive, under-approval state.
    ///
    /// Non-global rules open a create-or-update pipeline; global rules stay
    /// ungated until an admin force-activates them.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateName`] on a name collision and
    /// [`EngineError::AccessDenied`] when a non-admin creates a global rule.
    pub fn create_rule(
        &self,
        draft: &RuleDraft,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        if draft.is_global && !actor.is_admin(&self.settings.admin_group) {
            return Err(EngineError::AccessDenied(format!(
                "creating global rule {} requires the {} group",
                draft.name, self.settings.admin_group
            )));
        }
        if self.store.rule_by_name(&draft.owner_group, &draft.name)?.is_some() {
            return Err(EngineError::DuplicateName {
                owner_group: draft.owner_group.clone(),
                name: draft.name.clone(),
            });
        }

        let analysis = self
            .analyzer
            .analyze(draft.sql.as_deref(), draft.decision_table_id.is_some())
            .map_err(|err| EngineError::Backend(err.to_string()))?;

        let mut rule = rule_from_draft(draft, actor, now);
        rule.operation_kind = analysis.operation_kind;
        let dependencies = dependency_rows(rule.rule_id, &analysis);

        let audit = AuditEntry::new(
            AuditAction::Insert,
            RULES_TABLE,
            rule.rule_id.as_i64(),
            actor.clone(),
            None,
            Some(rule_snapshot(&rule)),
            now,
        );
        let assigned = self.store.insert_rule(&rule, &dependencies, &audit)?;
        rule.rule_id = assigned;

        if !rule.is_global {
            self.open_pipeline(&rule, ActionType::CreateOrUpdate)?;
        }
        self.notify_best_effort(
            &format!("Rule {} created", rule.name),
            &format!("Rule {assigned} ({}) was created by {}", rule.name, actor.user),
        );
        Ok(rule)
    }

    /// Updates a rule, re-running analysis and reopening approval.
    ///
    /// The caller must hold the rule's edit lock unless they are an admin.
    /// Applying identical field values still increments the version and
    /// records an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockConflict`] or [`EngineError::AccessDenied`]
    /// on authorization failures and [`EngineError::DuplicateName`] when a
    /// changed name collides.
    pub fn update_rule(
        &self,
        rule_id: RuleId,
        draft: &RuleDraft,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let existing = self.rule(rule_id)?;
        self.ensure_lock_or_admin(rule_id, actor, now)?;
        if (existing.is_global || draft.is_global) && !actor.is_admin(&self.settings.admin_group) {
            return Err(EngineError::AccessDenied(format!(
                "updating global rule {rule_id} requires the {} group",
                self.settings.admin_group
            )));
        }
        if (draft.name != existing.name || draft.owner_group != existing.owner_group)
            && self.store.rule_by_name(&draft.owner_group, &draft.name)?.is_some()
        {
            return Err(EngineError::DuplicateName {
                owner_group: draft.owner_group.clone(),
                name: draft.name.clone(),
            });
        }

        let analysis = self
            .analyzer
            .analyze(draft.sql.as_deref(), draft.decision_table_id.is_some())
            .map_err(|err| EngineError::Backend(err.to_string()))?;

        let mut updated = rule_from_draft(draft, actor, now);
        updated.rule_id = existing.rule_id;
        updated.operation_kind = analysis.operation_kind;
        updated.version = existing.version + 1;
        updated.created_by = existing.created_by.clone();
        updated.created_at = existing.created_at;
        let dependencies = dependency_rows(existing.rule_id, &analysis);

        let audit = AuditEntry::new(
            AuditAction::Update,
            RULES_TABLE,
            existing.rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(&existing)),
            Some(rule_snapshot(&updated)),
            now,
        );
        self.store.update_rule(&updated, Some(&dependencies), &audit)?;
        self.open_pipeline(&updated, ActionType::CreateOrUpdate)?;
        self.notify_best_effort(
            &format!("Rule {} updated", updated.name),
            &format!("Rule {rule_id} ({}) was updated by {}", updated.name, actor.user),
        );
        Ok(updated)
    }

    /// Requests deactivation, opening a deactivate pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when an active child
    /// exists; children must be deactivated first.
    pub fn deactivate_rule(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let existing = self.rule(rule_id)?;
        self.ensure_lock_or_admin(rule_id, actor, now)?;
        self.ensure_global_privilege(&existing, actor, "deactivating")?;
        let active_children: Vec<RuleId> = self
            .store
            .children_of(rule_id)?
            .into_iter()
            .filter(|child| child.status == RuleStatus::Active)
            .map(|child| child.rule_id)
            .collect();
        if !active_children.is_empty() {
            return Err(EngineError::InvariantViolation(format!(
                "rule {rule_id} has active children {}; deactivate them first",
                id_list(&active_children)
            )));
        }

        let transitioned = self.transition(
            &existing,
            RuleStatus::DeactivateInProgress,
            ApprovalStatus::DeactivateInProgress,
            LifecycleState::DeactivatePending,
            AuditAction::RequestDeactivate,
            actor,
            now,
        )?;
        self.open_pipeline(&transitioned, ActionType::Deactivate)?;
        Ok(transitioned)
    }

    /// Requests deletion, opening a delete pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when children or
    /// column-mapping references remain.
    pub fn delete_rule(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let existing = self.rule(rule_id)?;
        self.ensure_lock_or_admin(rule_id, actor, now)?;
        self.ensure_global_privilege(&existing, actor, "deleting")?;
        self.ensure_removable(rule_id)?;

        let transitioned = self.transition(
            &existing,
            RuleStatus::DeleteInProgress,
            ApprovalStatus::DeleteInProgress,
            LifecycleState::DeletePending,
            AuditAction::RequestDelete,
            actor,
            now,
        )?;
        self.open_pipeline(&transitioned, ActionType::Delete)?;
        Ok(transitioned)
    }

    // ------------------------------------------------------------------
    // Force Paths
    // ------------------------------------------------------------------

    /// Activates a rule regardless of pipeline state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccessDenied`] when the caller is not an admin.
    pub fn force_activate(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        self.ensure_admin(actor, "force-activate", rule_id)?;
        let existing = self.rule(rule_id)?;
        self.transition(
            &existing,
            RuleStatus::Active,
            ApprovalStatus::ForceActivated,
            LifecycleState::Active,
            AuditAction::ForceActivate,
            actor,
            now,
        )
    }

    /// Deactivates a rule bypassing approval.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccessDenied`] when the caller is not an admin.
    pub fn force_deactivate(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        self.ensure_admin(actor, "force-deactivate", rule_id)?;
        let existing = self.rule(rule_id)?;
        self.transition(
            &existing,
            RuleStatus::Inactive,
            ApprovalStatus::ForceDeactivated,
            LifecycleState::Inactive,
            AuditAction::ForceDeactivate,
            actor,
            now,
        )
    }

    /// Physically removes a rule bypassing approval.
    ///
    /// Permitted only from the inactive status with no children and no
    /// column-mapping references.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AccessDenied`] for non-admin callers and
    /// [`EngineError::InvariantViolation`] when removal preconditions fail.
    pub fn force_delete(
        &self,
        rule_id: RuleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        self.ensure_admin(actor, "force-delete", rule_id)?;
        let existing = self.rule(rule_id)?;
        if existing.status != RuleStatus::Inactive {
            return Err(EngineError::InvariantViolation(format!(
                "rule {rule_id} must be inactive before force-delete"
            )));
        }
        self.ensure_removable(rule_id)?;

        let audit = AuditEntry::new(
            AuditAction::ForceDelete,
            RULES_TABLE,
            rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(&existing)),
            None,
            now,
        );
        self.store.remove_rule(rule_id, &audit)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared Guards
    // ------------------------------------------------------------------

    /// Writes one audited rule-state transition.
    #[allow(clippy::too_many_arguments, reason = "Transition captures one full state change.")]
    fn transition(
        &self,
        existing: &Rule,
        status: RuleStatus,
        approval_status: ApprovalStatus,
        lifecycle_state: LifecycleState,
        action: AuditAction,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Rule, EngineError> {
        let mut next = existing.clone();
        next.status = status;
        next.approval_status = approval_status;
        next.lifecycle_state = lifecycle_state;
        next.version = existing.version + 1;
        next.updated_by = actor.user.clone();
        next.updated_at = now;

        let audit = AuditEntry::new(
            action,
            RULES_TABLE,
            existing.rule_id.as_i64(),
            actor.clone(),
            Some(rule_snapshot(existing)),
            Some(rule_snapshot(&next)),
            now,
        );
        self.store.update_rule(&next, None, &audit)?;
        Ok(next)
    }

    /// Rejects global-rule mutations from non-admin actors.
    fn ensure_global_privilege(
        &self,
        rule: &Rule,
        actor: &Actor,
        verb: &str,
    ) -> Result<(), EngineError> {
        if rule.is_global && !actor.is_admin(&self.settings.admin_group) {
            return Err(EngineError::AccessDenied(format!(
                "{verb} global rule {} requires the {} group",
                rule.rule_id, self.settings.admin_group
            )));
        }
        Ok(())
    }

    /// Rejects force-path calls from non-admin actors.
    fn ensure_admin(&self, actor: &Actor, verb: &str, rule_id: RuleId) -> Result<(), EngineError> {
        if actor.is_admin(&self.settings.admin_group) {
            return Ok(());
        }
        Err(EngineError::AccessDenied(format!(
            "{verb} on rule {rule_id} requires the {} group",
            self.settings.admin_group
        )))
    }

    /// Rejects removal while children or column-mapping references remain.
    fn ensure_removable(&self, rule_id: RuleId) -> Result<(), EngineError> {
        let children = self.store.children_of(rule_id)?;
        if !children.is_empty() {
            let ids: Vec<RuleId> = children.iter().map(|child| child.rule_id).collect();
            return Err(EngineError::InvariantViolation(format!(
                "rule {rule_id} still has child rules {}",
                id_list(&ids)
            )));
        }
        let referenced = self
            .store
            .column_mappings()?
            .iter()
            .any(|mapping| mapping.rule_id == rule_id || mapping.mapped_rule_id == rule_id);
        if referenced {
            return Err(EngineError::InvariantViolation(format!(
                "rule {rule_id} is still referenced by column mappings"
            )));
        }
        Ok(())
    }

    /// Sends a lifecycle notification, logging failures instead of raising.
    fn notify_best_effort(&self, subject: &str, body: &str) {
        if self.settings.notify_recipients.is_empty() {
            return;
        }
        if let Err(err) = self.notifier.notify(subject, body, &self.settings.notify_recipients) {
            tracing::warn!(subject, error = %err, "lifecycle notification failed");
        }
    }
}

// ============================================================================
// SECTION: Draft Expansion
// ============================================================================

/// Builds the stored rule from a caller draft.
fn rule_from_draft(draft: &RuleDraft, actor: &Actor, now: Timestamp) -> Rule {
    Rule {
        rule_id: RuleId::new(0),
        name: draft.name.clone(),
        sql: draft.sql.clone(),
        rule_type: draft.rule_type.clone(),
        owner_group: draft.owner_group.clone(),
        parent_rule_id: draft.parent_rule_id,
        group_id: draft.group_id,
        effective_start: draft.effective_start,
        effective_end: draft.effective_end,
        operation_kind: crate::core::rule::OperationKind::Other,
        is_global: draft.is_global,
        critical_rule: draft.critical_rule,
        critical_scope: draft.critical_scope,
        cdc_type: draft.cdc_type.clone(),
        status: RuleStatus::Inactive,
        approval_status: ApprovalStatus::ApprovalInProgress,
        lifecycle_state: LifecycleState::UnderApproval,
        version: 1,
        created_by: actor.user.clone(),
        created_at: now,
        updated_by: actor.user.clone(),
        updated_at: now,
        decision_table_id: draft.decision_table_id,
        logic_expr: draft.logic_expr.clone(),
    }
}

/// Builds dependency rows from an analysis: one row per table, plus
/// column-level rows when the statement touches a single table.
fn dependency_rows(rule_id: RuleId, analysis: &SqlAnalysis) -> Vec<TableDependency> {
    let table_op = if analysis.operation_kind.is_write() {
        ColumnOp::Write
    } else {
        ColumnOp::Read
    };
    let mut rows: Vec<TableDependency> = analysis
        .tables
        .iter()
        .map(|table| TableDependency {
            rule_id,
            database_name: table.database.clone(),
            table_name: table.qualified_name(),
            column_name: None,
            column_op: table_op,
        })
        .collect();
    if let [only_table] = analysis.tables.as_slice() {
        for column in &analysis.columns {
            rows.push(TableDependency {
                rule_id,
                database_name: only_table.database.clone(),
                table_name: only_table.qualified_name(),
                column_name: Some(column.column.clone()),
                column_op: column.usage,
            });
        }
    }
    rows
}
