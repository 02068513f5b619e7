// crates/rulewarden-config/tests/roster_validation.rs
// ============================================================================
// Module: Config Roster Validation Tests
// Description: Stage order, approver coverage, and bound enforcement.
// Purpose: Validate the fail-closed roster and engine bound checks.
// ============================================================================

//! Validation tests for roster consistency and engine bounds.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

use rulewarden_config::ConfigError;
use rulewarden_config::RulewardenConfig;

/// Builds a config from the approvals body plus optional engine body.
fn config(approvals: &str, engine: &str) -> Result<RulewardenConfig, ConfigError> {
    RulewardenConfig::from_toml(&format!("{engine}\n[approvals]\n{approvals}"))
}

#[test]
fn stage_group_without_approvers_is_rejected() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = ["BG1"]
"#,
        "",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("BG1"));
}

#[test]
fn empty_approver_list_is_rejected() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = ["BG1"]
[approvals.approvers]
BG1 = []
"#,
        "",
    )
    .unwrap_err();
    assert!(err.to_string().contains("at least one approver"));
}

#[test]
fn duplicate_stage_groups_are_rejected() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = ["BG1", "BG1"]
[approvals.approvers]
BG1 = ["alice"]
"#,
        "",
    )
    .unwrap_err();
    assert!(err.to_string().contains("repeats"));
}

#[test]
fn terminal_stage_cannot_appear_in_stage_order() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = ["FINAL"]
[approvals.approvers]
FINAL = ["chief"]
"#,
        "",
    )
    .unwrap_err();
    assert!(err.to_string().contains("terminal"));
}

#[test]
fn blank_final_approver_is_rejected() {
    let err = config(
        r#"
final_approver = "  "
stage_order = []
"#,
        "",
    )
    .unwrap_err();
    assert!(err.to_string().contains("final_approver"));
}

#[test]
fn scheduler_cadence_bounds_are_enforced() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = []
"#,
        "[engine]\nscheduler_cadence_ms = 10\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("scheduler_cadence_ms"));
}

#[test]
fn lock_ttl_bounds_are_enforced() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = []
"#,
        "[engine]\ndefault_lock_ttl_ms = 0\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("default_lock_ttl_ms"));
}

#[test]
fn zero_sample_limit_is_rejected() {
    let err = config(
        r#"
final_approver = "chief"
stage_order = []
"#,
        "[engine]\nvalidation_sample_limit = 0\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("validation_sample_limit"));
}

#[test]
fn empty_stage_order_with_final_only_is_valid() {
    let config = config(
        r#"
final_approver = "chief"
stage_order = []
"#,
        "",
    )
    .unwrap();
    let roster = config.approval_roster();
    assert!(roster.stage_order.is_empty());
    assert_eq!(roster.final_approver.as_str(), "chief");
}
