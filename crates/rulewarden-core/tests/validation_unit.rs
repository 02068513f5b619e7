// crates/rulewarden-core/tests/validation_unit.rs
// ============================================================================
// Module: Data Validation Runner Unit Tests
// Description: NOT NULL, RANGE, REGEX, FOREIGN_KEY, and unknown kinds.
// Purpose: Validate per-kind pass/fail decisions and log row contents.
// ============================================================================

//! Validation runner tests over the scripted backend.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::ts;
use rulewarden_core::DataValidation;
use rulewarden_core::ScriptedBackend;
use rulewarden_core::ValidationId;
use rulewarden_core::ValidationKind;
use rulewarden_core::runtime::run_validation;

/// Builds a validation row for the given kind and params.
fn validation(kind: ValidationKind, params: Option<&str>) -> DataValidation {
    DataValidation {
        validation_id: ValidationId::new(7),
        table_name: "orders".to_string(),
        column_name: "total".to_string(),
        kind,
        params: params.map(str::to_string),
    }
}

#[test]
fn not_null_passes_when_no_nulls_exist() {
    let backend = ScriptedBackend::new();
    let entry =
        run_validation(&backend, &validation(ValidationKind::NotNull, None), 500, ts(1_000));
    assert!(entry.passed);
    assert_eq!(entry.validation_id, ValidationId::new(7));
    assert_eq!(entry.at, ts(1_000));
}

#[test]
fn not_null_fails_with_a_count_in_the_message() {
    let backend = ScriptedBackend::new();
    backend.set_null_count("orders", "total", 4);
    let entry =
        run_validation(&backend, &validation(ValidationKind::NotNull, None), 500, ts(1_000));
    assert!(!entry.passed);
    assert!(entry.message.contains('4'));
}

#[test]
fn range_fails_outside_bounds_and_rejects_bad_params() {
    let backend = ScriptedBackend::new();
    backend.set_range_violations("orders", "total", 2);
    let entry =
        run_validation(&backend, &validation(ValidationKind::Range, Some("0,100")), 500, ts(1_000));
    assert!(!entry.passed);
    assert!(entry.message.contains("outside"));

    let malformed =
        run_validation(&backend, &validation(ValidationKind::Range, Some("0")), 500, ts(1_000));
    assert!(!malformed.passed);
    assert!(malformed.message.contains("min,max"));
}

#[test]
fn regex_checks_the_sampled_values() {
    let backend = ScriptedBackend::new();
    backend.set_samples(
        "orders",
        "total",
        vec!["ab12".to_string(), "cd34".to_string(), "nope!".to_string()],
    );
    let entry = run_validation(
        &backend,
        &validation(ValidationKind::Regex, Some("^[a-z]{2}\\d{2}$")),
        500,
        ts(1_000),
    );
    assert!(!entry.passed);
    assert!(entry.message.contains("1 sampled"));

    let invalid_pattern =
        run_validation(&backend, &validation(ValidationKind::Regex, Some("(")), 500, ts(1_000));
    assert!(!invalid_pattern.passed);
    assert!(invalid_pattern.message.contains("invalid pattern"));
}

#[test]
fn regex_sample_is_bounded() {
    let backend = ScriptedBackend::new();
    let values: Vec<String> = (0..1_000).map(|i| format!("v{i}")).collect();
    backend.set_samples("orders", "total", values);
    let entry =
        run_validation(&backend, &validation(ValidationKind::Regex, Some("^v\\d+$")), 500, ts(1_000));
    assert!(entry.passed);
    assert!(entry.message.starts_with("500 "));
}

#[test]
fn foreign_key_fails_on_missing_references() {
    let backend = ScriptedBackend::new();
    backend.set_missing_references("orders", "total", 5);
    let entry = run_validation(
        &backend,
        &validation(ValidationKind::ForeignKey, Some("customers,id")),
        500,
        ts(1_000),
    );
    assert!(!entry.passed);
    assert!(entry.message.contains("customers.id"));
}

#[test]
fn unknown_kinds_fail_explicitly() {
    let backend = ScriptedBackend::new();
    let entry = run_validation(
        &backend,
        &validation(ValidationKind::Unknown("CHECKSUM".to_string()), None),
        500,
        ts(1_000),
    );
    assert!(!entry.passed);
    assert_eq!(entry.message, "Unknown validation type: CHECKSUM");
}
