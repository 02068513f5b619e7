// crates/rulewarden-core/src/core/execution.rs
// ============================================================================
// Module: Rulewarden Execution Records
// Description: Execution and validation log rows plus the executor report.
// Purpose: Capture per-rule outcomes and the aggregate traversal result.
// Dependencies: crate::core::{identifiers, time, validation}, serde
// ============================================================================

//! ## Overview
//! The executor appends one execution-log row per attempted rule, pass or
//! fail, and the validation runner appends one validation-log row per check.
//! Both logs are append-only; the aggregate [`ExecutionReport`] summarizes a
//! single traversal for the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;
use crate::core::identifiers::ValidationId;
use crate::core::time::Timestamp;
use crate::core::validation::ValidationKind;

// ============================================================================
// SECTION: Execution Log
// ============================================================================

/// Append-only record of one rule execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Executed rule.
    pub rule_id: RuleId,
    /// Execution timestamp.
    pub fired_at: Timestamp,
    /// Whether the probe passed.
    pub pass_flag: bool,
    /// Outcome message; the error string on failure.
    pub message: String,
    /// Records affected or returned by the rule SQL.
    pub record_count: i64,
    /// Wall time spent executing, in milliseconds.
    pub elapsed_ms: i64,
}

// ============================================================================
// SECTION: Validation Log
// ============================================================================

/// Append-only record of one data-validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    /// Validation that ran.
    pub validation_id: ValidationId,
    /// Validated table.
    pub table_name: String,
    /// Validated column.
    pub column_name: String,
    /// Validation kind.
    pub kind: ValidationKind,
    /// Raw parameter string the validation was configured with.
    pub params: Option<String>,
    /// Whether the check passed.
    pub passed: bool,
    /// Outcome message.
    pub message: String,
    /// Run timestamp.
    pub at: Timestamp,
}

// ============================================================================
// SECTION: Execution Report
// ============================================================================

/// Aggregate result of one executor traversal.
///
/// # Invariants
/// - `executed` and `skipped` are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Rules executed, in traversal order.
    pub executed: Vec<RuleId>,
    /// Rules skipped by validation gating or critical-failure propagation.
    pub skipped: Vec<RuleId>,
    /// Human-readable validation failures encountered during gating.
    pub validation_failures: Vec<String>,
}
