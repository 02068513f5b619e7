// crates/rulewarden-core/tests/executor_unit.rs
// ============================================================================
// Module: Executor Unit Tests
// Description: BFS ordering, critical skip propagation, and validation gates.
// Purpose: Validate the traversal contract under failures and cycles.
// ============================================================================

//! Executor tests covering ordering, skips, gating, and error capture.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::admin;
use common::draft;
use common::harness;
use common::ts;
use rulewarden_core::CriticalScope;
use rulewarden_core::DataValidation;
use rulewarden_core::EngineError;
use rulewarden_core::ExecutionOptions;
use rulewarden_core::Rule;
use rulewarden_core::RuleId;
use rulewarden_core::Store;
use rulewarden_core::ValidationId;
use rulewarden_core::ValidationKind;

/// Creates a chain parent -> child -> grandchild with the given SQL texts.
fn chain(h: &common::TestHarness, sqls: [&str; 3]) -> [Rule; 3] {
    let parent = h.engine.create_rule(&draft("P", sqls[0]), &admin(), ts(1_000)).unwrap();
    let mut child_draft = draft("C", sqls[1]);
    child_draft.parent_rule_id = Some(parent.rule_id);
    let child = h.engine.create_rule(&child_draft, &admin(), ts(1_001)).unwrap();
    let mut grandchild_draft = draft("G", sqls[2]);
    grandchild_draft.parent_rule_id = Some(child.rule_id);
    let grandchild = h.engine.create_rule(&grandchild_draft, &admin(), ts(1_002)).unwrap();
    [parent, child, grandchild]
}

#[test]
fn passing_chain_executes_in_dependency_order() {
    let h = harness();
    let [parent, child, grandchild] = chain(&h, ["SELECT 1", "SELECT 1", "SELECT 1"]);
    h.backend.respond_pass("SELECT 1");

    let report = h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    assert_eq!(report.executed, vec![parent.rule_id, child.rule_id, grandchild.rule_id]);
    assert!(report.skipped.is_empty());
}

#[test]
fn critical_failure_skips_all_descendants() {
    let h = harness();
    let mut parent_draft = draft("P", "SELECT 0");
    parent_draft.critical_rule = true;
    parent_draft.critical_scope = CriticalScope::Group;
    let parent = h.engine.create_rule(&parent_draft, &admin(), ts(1_000)).unwrap();
    let mut child_draft = draft("C", "SELECT 1");
    child_draft.parent_rule_id = Some(parent.rule_id);
    let child = h.engine.create_rule(&child_draft, &admin(), ts(1_001)).unwrap();
    let mut grandchild_draft = draft("G", "SELECT 1");
    grandchild_draft.parent_rule_id = Some(child.rule_id);
    let grandchild = h.engine.create_rule(&grandchild_draft, &admin(), ts(1_002)).unwrap();

    h.backend.respond_fail("SELECT 0");
    h.backend.respond_pass("SELECT 1");

    let report = h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(report.skipped, vec![parent.rule_id, child.rule_id, grandchild.rule_id]);

    // Exactly one execution-log row, for the failing parent.
    let parent_logs = h.engine.execution_logs(parent.rule_id).unwrap();
    assert_eq!(parent_logs.len(), 1);
    assert!(!parent_logs[0].pass_flag);
    assert!(h.engine.execution_logs(child.rule_id).unwrap().is_empty());
    assert!(h.engine.execution_logs(grandchild.rule_id).unwrap().is_empty());
}

#[test]
fn non_critical_failure_does_not_propagate() {
    let h = harness();
    let [parent, child, grandchild] = chain(&h, ["SELECT 0", "SELECT 1", "SELECT 1"]);
    h.backend.respond_fail("SELECT 0");
    h.backend.respond_pass("SELECT 1");

    let report = h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    // The failing parent is skipped, but nothing propagates; the children are
    // simply never reached through it.
    assert_eq!(report.skipped, vec![parent.rule_id]);
    assert!(report.executed.is_empty());
    assert!(h.engine.execution_logs(child.rule_id).unwrap().is_empty());
    assert!(h.engine.execution_logs(grandchild.rule_id).unwrap().is_empty());
}

#[test]
fn start_ids_limit_the_traversal() {
    let h = harness();
    let [_, child, grandchild] = chain(&h, ["SELECT 1", "SELECT 1", "SELECT 1"]);
    h.backend.respond_pass("SELECT 1");

    let report = h
        .engine
        .execute(&ExecutionOptions::starting_at(vec![child.rule_id]), ts(10_000))
        .unwrap();
    assert_eq!(report.executed, vec![child.rule_id, grandchild.rule_id]);
}

#[test]
fn cycles_are_broken_by_first_visit() {
    let h = harness();
    let a = h.engine.create_rule(&draft("A", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut b_draft = draft("B", "SELECT 1");
    b_draft.parent_rule_id = Some(a.rule_id);
    // The composite expression points back at A's child, closing a cycle.
    b_draft.logic_expr = None;
    let b = h.engine.create_rule(&b_draft, &admin(), ts(1_001)).unwrap();
    let mut a_update = draft("A", "SELECT 1");
    a_update.logic_expr = Some(format!("Rule{} AND Rule{}", b.rule_id, b.rule_id));
    h.engine.update_rule(a.rule_id, &a_update, &admin(), ts(1_002)).unwrap();
    h.backend.respond_pass("SELECT 1");

    let report = h
        .engine
        .execute(&ExecutionOptions::starting_at(vec![a.rule_id]), ts(10_000))
        .unwrap();
    // Each node executes exactly once despite the A -> B -> A cycle.
    let mut executed = report.executed.clone();
    executed.sort_unstable();
    assert_eq!(executed, vec![a.rule_id, b.rule_id]);
}

#[test]
fn sql_error_is_captured_in_the_log_and_traversal_continues() {
    let h = harness();
    let boom = h.engine.create_rule(&draft("BOOM", "SELECT broken"), &admin(), ts(1_000)).unwrap();
    let fine = h.engine.create_rule(&draft("FINE", "SELECT 1"), &admin(), ts(1_001)).unwrap();
    h.backend.respond_error("SELECT broken", "syntax error near broken");
    h.backend.respond_pass("SELECT 1");

    let report = h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    assert_eq!(report.executed, vec![fine.rule_id]);
    assert_eq!(report.skipped, vec![boom.rule_id]);

    let logs = h.engine.execution_logs(boom.rule_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "syntax error near broken");
}

#[test]
fn missing_object_errors_get_friendlier_messages() {
    let h = harness();
    let rule =
        h.engine.create_rule(&draft("R", "SELECT 1 FROM gone"), &admin(), ts(1_000)).unwrap();
    h.backend.respond_missing_object("SELECT 1 FROM gone", "gone");

    h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    let logs = h.engine.execution_logs(rule.rule_id).unwrap();
    assert!(logs[0].message.contains("does not exist"));
    assert!(logs[0].message.contains("gone"));
}

#[test]
fn failed_validation_gates_the_rule_and_its_descendants() {
    let h = harness();
    let [parent, child, grandchild] =
        chain(&h, ["SELECT 1 FROM orders", "SELECT 1", "SELECT 1"]);
    h.backend.respond_pass("SELECT 1 FROM orders");
    h.backend.respond_pass("SELECT 1");

    h.store
        .insert_validation(&DataValidation {
            validation_id: ValidationId::new(0),
            table_name: "orders".to_string(),
            column_name: "total".to_string(),
            kind: ValidationKind::NotNull,
            params: None,
        })
        .unwrap();
    h.backend.set_null_count("orders", "total", 3);

    let report = h.engine.execute(&ExecutionOptions::from_roots(), ts(10_000)).unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(report.skipped, vec![parent.rule_id, child.rule_id, grandchild.rule_id]);
    assert_eq!(report.validation_failures.len(), 1);

    // The gate produced a validation-log row but no execution-log row.
    assert!(h.engine.execution_logs(parent.rule_id).unwrap().is_empty());
    assert_eq!(h.store.validation_logs().unwrap().len(), 1);
}

#[test]
fn skip_validations_bypasses_the_gate() {
    let h = harness();
    let rule =
        h.engine.create_rule(&draft("R", "SELECT 1 FROM orders"), &admin(), ts(1_000)).unwrap();
    h.backend.respond_pass("SELECT 1 FROM orders");
    h.store
        .insert_validation(&DataValidation {
            validation_id: ValidationId::new(0),
            table_name: "orders".to_string(),
            column_name: "total".to_string(),
            kind: ValidationKind::NotNull,
            params: None,
        })
        .unwrap();
    h.backend.set_null_count("orders", "total", 3);

    let options = ExecutionOptions {
        start_ids: vec![rule.rule_id],
        skip_validations: true,
    };
    let report = h.engine.execute(&options, ts(10_000)).unwrap();
    assert_eq!(report.executed, vec![rule.rule_id]);
    assert!(h.store.validation_logs().unwrap().is_empty());
}

#[test]
fn run_now_surfaces_failures_as_errors() {
    let h = harness();
    let good = h.engine.create_rule(&draft("GOOD", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let bad = h.engine.create_rule(&draft("BAD", "SELECT 0"), &admin(), ts(1_001)).unwrap();
    h.backend.respond_pass("SELECT 1");
    h.backend.respond_fail("SELECT 0");

    let entry = h.engine.execute_rule(good.rule_id, true, ts(10_000)).unwrap();
    assert!(entry.pass_flag);

    let err = h.engine.execute_rule(bad.rule_id, true, ts(10_001)).unwrap_err();
    assert!(matches!(err, EngineError::ExecutionFailed { .. }));
    // The failed attempt is still logged.
    let logs = h.engine.execution_logs(bad.rule_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].pass_flag);
}

#[test]
fn run_now_rejects_on_failed_validations() {
    let h = harness();
    let rule =
        h.engine.create_rule(&draft("R", "SELECT 1 FROM orders"), &admin(), ts(1_000)).unwrap();
    h.backend.respond_pass("SELECT 1 FROM orders");
    h.store
        .insert_validation(&DataValidation {
            validation_id: ValidationId::new(0),
            table_name: "orders".to_string(),
            column_name: "total".to_string(),
            kind: ValidationKind::NotNull,
            params: None,
        })
        .unwrap();
    h.backend.set_null_count("orders", "total", 2);

    let err = h.engine.execute_rule(rule.rule_id, false, ts(10_000)).unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed { .. }));
    // The gate ran and logged, but the rule SQL never executed.
    assert!(h.engine.execution_logs(rule.rule_id).unwrap().is_empty());
    assert_eq!(h.store.validation_logs().unwrap().len(), 1);
}

#[test]
fn dangling_composite_reference_still_reaches_children() {
    let h = harness();
    let mut composite_draft = draft("COMPOSITE", "SELECT 1");
    composite_draft.logic_expr = Some("Rule9999".to_string());
    let composite = h.engine.create_rule(&composite_draft, &admin(), ts(1_000)).unwrap();
    h.backend.respond_pass("SELECT 1");

    let report = h
        .engine
        .execute(&ExecutionOptions::starting_at(vec![RuleId::new(9_999)]), ts(10_000))
        .unwrap();
    assert_eq!(report.executed, vec![composite.rule_id]);
}
