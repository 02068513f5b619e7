// crates/rulewarden-core/tests/lifecycle_unit.rs
// ============================================================================
// Module: Rule Lifecycle Unit Tests
// Description: Create, update, deactivate, delete, and the admin force paths.
// Purpose: Validate lifecycle guards, state transitions, and audit coverage.
// ============================================================================

//! Lifecycle tests covering the create/approve, force, and guard paths.

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
use rulewarden_core::ActionType;
use rulewarden_core::Actor;
use rulewarden_core::ApprovalStatus;
use rulewarden_core::AuditAction;
use rulewarden_core::AuditQuery;
use rulewarden_core::EngineError;
use rulewarden_core::GroupName;
use rulewarden_core::RuleStatus;
use rulewarden_core::Store;

#[test]
fn create_starts_inactive_under_approval() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    assert_eq!(rule.status, RuleStatus::Inactive);
    assert_eq!(rule.approval_status, ApprovalStatus::ApprovalInProgress);
    assert_eq!(rule.version, 1);

    // BG1 stage plus the terminal stage.
    let rows = h.engine.approvals(rule.rule_id, ActionType::CreateOrUpdate).unwrap();
    let stages: Vec<(u32, &str)> =
        rows.iter().map(|row| (row.approval_stage, row.group_name.as_str())).collect();
    assert_eq!(stages, vec![(1, "BG1"), (2, "FINAL")]);
}

#[test]
fn happy_path_create_and_approve() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let mid = h
        .engine
        .approve(rule.rule_id, ActionType::CreateOrUpdate, &GroupName::new("BG1"), &operator(), ts(2_000))
        .unwrap();
    assert_eq!(mid.status, RuleStatus::Inactive);
    assert_eq!(mid.approval_status, ApprovalStatus::ApprovalInProgress);

    let done = h
        .engine
        .approve(
            rule.rule_id,
            ActionType::CreateOrUpdate,
            &GroupName::new("FINAL"),
            &Actor::new("chief", "FINAL"),
            ts(3_000),
        )
        .unwrap();
    assert_eq!(done.status, RuleStatus::Active);
    assert_eq!(done.approval_status, ApprovalStatus::Approved);
}

#[test]
fn duplicate_name_in_group_is_rejected() {
    let h = harness();
    h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let err = h.engine.create_rule(&draft("R", "SELECT 2"), &admin(), ts(2_000)).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateName { .. }));

    // Same name in another group is fine.
    let mut other = draft("R", "SELECT 1");
    other.owner_group = GroupName::new("BG2");
    h.engine.create_rule(&other, &admin(), ts(3_000)).unwrap();
}

#[test]
fn global_rule_requires_admin() {
    let h = harness();
    let mut global = draft("G", "SELECT 1");
    global.is_global = true;

    let err = h.engine.create_rule(&global, &operator(), ts(1_000)).unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));

    let rule = h.engine.create_rule(&global, &admin(), ts(2_000)).unwrap();
    // Global rules stay ungated until force-activated.
    assert!(h.engine.approvals(rule.rule_id, ActionType::CreateOrUpdate).unwrap().is_empty());
}

#[test]
fn update_requires_lock_and_reopens_approval() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    // Without a lock, a non-admin update is refused.
    let err = h
        .engine
        .update_rule(rule.rule_id, &draft("R", "SELECT 2"), &operator(), ts(2_000))
        .unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));

    h.engine.acquire_lock(rule.rule_id, &operator(), None, ts(2_500)).unwrap();
    let updated = h
        .engine
        .update_rule(rule.rule_id, &draft("R", "SELECT 2 FROM t"), &operator(), ts(3_000))
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.status, RuleStatus::Inactive);
    assert_eq!(updated.approval_status, ApprovalStatus::ApprovalInProgress);

    // Dependencies were refreshed from the new SQL.
    let deps = h.store.table_dependencies(rule.rule_id).unwrap();
    assert!(deps.iter().any(|dep| dep.table_name == "t"));
}

#[test]
fn identical_update_still_increments_version() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let updated =
        h.engine.update_rule(rule.rule_id, &draft("R", "SELECT 1"), &admin(), ts(2_000)).unwrap();
    assert_eq!(updated.version, 2);

    let audits = h
        .engine
        .audit_entries(&AuditQuery {
            action: Some(AuditAction::Update),
            record_id: Some(rule.rule_id.as_i64()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(audits.len(), 1);
}

#[test]
fn lock_conflict_blocks_non_admin_but_not_admin() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let ttl_ms = 10 * 60 * 1_000;
    let lock =
        h.engine.acquire_lock(rule.rule_id, &operator(), Some(ttl_ms), ts(10_000)).unwrap();
    assert_eq!(lock.expires_at, ts(10_000 + ttl_ms));

    // Another user hits the holder and expiry in the error.
    let err = h
        .engine
        .update_rule(rule.rule_id, &draft("R", "SELECT 2"), &Actor::new("bob", "BG2"), ts(11_000))
        .unwrap_err();
    match err {
        EngineError::LockConflict {
            holder,
            expires_at,
            ..
        } => {
            assert_eq!(holder.as_str(), "alice");
            assert_eq!(expires_at, ts(10_000 + ttl_ms));
        }
        other => panic!("expected LockConflict, got {other:?}"),
    }

    // Admin is exempt even while the lock is live.
    h.engine.update_rule(rule.rule_id, &draft("R", "SELECT 2"), &admin(), ts(12_000)).unwrap();
}

#[test]
fn deactivate_requires_approval_then_inactivates() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    h.engine.force_activate(rule.rule_id, &admin(), ts(2_000)).unwrap();

    let pending = h.engine.deactivate_rule(rule.rule_id, &admin(), ts(3_000)).unwrap();
    assert_eq!(pending.status, RuleStatus::DeactivateInProgress);
    assert!(!h.engine.approvals(rule.rule_id, ActionType::Deactivate).unwrap().is_empty());

    h.engine
        .approve(rule.rule_id, ActionType::Deactivate, &GroupName::new("BG1"), &operator(), ts(4_000))
        .unwrap();
    let done = h
        .engine
        .approve(
            rule.rule_id,
            ActionType::Deactivate,
            &GroupName::new("FINAL"),
            &Actor::new("chief", "FINAL"),
            ts(5_000),
        )
        .unwrap();
    assert_eq!(done.status, RuleStatus::Inactive);
    assert_eq!(done.approval_status, ApprovalStatus::Approved);

    // One deactivation request and one completion status change.
    let request = h
        .engine
        .audit_entries(&AuditQuery {
            action: Some(AuditAction::RequestDeactivate),
            ..AuditQuery::default()
        })
        .unwrap();
    let status_change = h
        .engine
        .audit_entries(&AuditQuery {
            action: Some(AuditAction::StatusChange),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(request.len(), 1);
    assert_eq!(status_change.len(), 1);
    assert!(request[0].at < status_change[0].at);
}

#[test]
fn deactivate_with_active_child_is_rejected() {
    let h = harness();
    let parent = h.engine.create_rule(&draft("P", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut child_draft = draft("C", "SELECT 1");
    child_draft.parent_rule_id = Some(parent.rule_id);
    let child = h.engine.create_rule(&child_draft, &admin(), ts(2_000)).unwrap();
    h.engine.force_activate(parent.rule_id, &admin(), ts(3_000)).unwrap();
    h.engine.force_activate(child.rule_id, &admin(), ts(4_000)).unwrap();

    let err = h.engine.deactivate_rule(parent.rule_id, &admin(), ts(5_000)).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));

    h.engine.force_deactivate(child.rule_id, &admin(), ts(6_000)).unwrap();
    h.engine.deactivate_rule(parent.rule_id, &admin(), ts(7_000)).unwrap();
}

#[test]
fn delete_pipeline_completion_removes_the_rule() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    h.engine.delete_rule(rule.rule_id, &admin(), ts(2_000)).unwrap();
    h.engine
        .approve(rule.rule_id, ActionType::Delete, &GroupName::new("BG1"), &operator(), ts(3_000))
        .unwrap();
    h.engine
        .approve(
            rule.rule_id,
            ActionType::Delete,
            &GroupName::new("FINAL"),
            &Actor::new("chief", "FINAL"),
            ts(4_000),
        )
        .unwrap();

    assert!(h.store.rule(rule.rule_id).unwrap().is_none());
    let removal = h
        .engine
        .audit_entries(&AuditQuery {
            action: Some(AuditAction::Delete),
            record_id: Some(rule.rule_id.as_i64()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(removal.len(), 1);
    assert!(removal[0].old_data.is_some());
    assert!(removal[0].new_data.is_none());
}

#[test]
fn delete_with_children_is_rejected() {
    let h = harness();
    let parent = h.engine.create_rule(&draft("P", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut child_draft = draft("C", "SELECT 1");
    child_draft.parent_rule_id = Some(parent.rule_id);
    h.engine.create_rule(&child_draft, &admin(), ts(2_000)).unwrap();

    let err = h.engine.delete_rule(parent.rule_id, &admin(), ts(3_000)).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));
}

#[test]
fn force_activate_bypasses_the_pipeline() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();

    let err = h.engine.force_activate(rule.rule_id, &operator(), ts(2_000)).unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));

    let forced = h.engine.force_activate(rule.rule_id, &admin(), ts(3_000)).unwrap();
    assert_eq!(forced.status, RuleStatus::Active);
    assert_eq!(forced.approval_status, ApprovalStatus::ForceActivated);
    assert_eq!(forced.version, rule.version + 1);

    let audits = h
        .engine
        .audit_entries(&AuditQuery {
            action: Some(AuditAction::ForceActivate),
            record_id: Some(rule.rule_id.as_i64()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(audits.len(), 1);
}

#[test]
fn force_delete_requires_inactive_status() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    h.engine.force_activate(rule.rule_id, &admin(), ts(2_000)).unwrap();

    let err = h.engine.force_delete(rule.rule_id, &admin(), ts(3_000)).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));

    h.engine.force_deactivate(rule.rule_id, &admin(), ts(4_000)).unwrap();
    h.engine.force_delete(rule.rule_id, &admin(), ts(5_000)).unwrap();
    assert!(h.store.rule(rule.rule_id).unwrap().is_none());
}

#[test]
fn every_mutation_strictly_increases_version() {
    let h = harness();
    let rule = h.engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut last = rule.version;

    for (step, at) in [(1_i64, 2_000_i64), (2, 3_000), (3, 4_000)] {
        let updated = h
            .engine
            .update_rule(rule.rule_id, &draft("R", &format!("SELECT {step}")), &admin(), ts(at))
            .unwrap();
        assert!(updated.version > last);
        last = updated.version;
    }
}

#[test]
fn create_sends_a_notification_when_recipients_configured() {
    let store = rulewarden_core::InMemoryStore::new();
    let backend = rulewarden_core::ScriptedBackend::passing();
    let notifier = rulewarden_core::ChannelNotifier::new();
    let mut settings = rulewarden_core::EngineSettings::default();
    settings.notify_recipients = vec!["ops@example.com".to_string()];
    let engine = rulewarden_core::Engine::new(
        store,
        backend,
        rulewarden_core::RegexSqlAnalyzer::new().unwrap(),
        notifier.clone(),
        settings,
        common::roster(),
    )
    .unwrap();

    engine.create_rule(&draft("R", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, vec!["ops@example.com".to_string()]);
}
