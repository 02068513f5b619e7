// crates/rulewarden-core/src/runtime/validation.rs
// ============================================================================
// Module: Rulewarden Data Validation Runner
// Description: Executes configured column-level checks against the backend.
// Purpose: Decide pass or fail per validation and produce its log row.
// Dependencies: crate::{core, interfaces}, regex
// ============================================================================

//! ## Overview
//! Each configured validation runs one bounded query through the execution
//! backend and yields exactly one validation-log row. Unknown kinds fail
//! explicitly rather than passing silently; malformed parameters fail with
//! the parse problem in the message.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;

use crate::core::execution::ValidationLogEntry;
use crate::core::time::Timestamp;
use crate::core::validation::DataValidation;
use crate::core::validation::ValidationKind;
use crate::interfaces::ExecutionBackend;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs one validation and builds its log row.
#[must_use]
pub fn run_validation<B: ExecutionBackend>(
    backend: &B,
    validation: &DataValidation,
    sample_limit: usize,
    now: Timestamp,
) -> ValidationLogEntry {
    let (passed, message) = evaluate(backend, validation, sample_limit);
    ValidationLogEntry {
        validation_id: validation.validation_id,
        table_name: validation.table_name.clone(),
        column_name: validation.column_name.clone(),
        kind: validation.kind.clone(),
        params: validation.params.clone(),
        passed,
        message,
        at: now,
    }
}

/// Evaluates one validation against the backend.
fn evaluate<B: ExecutionBackend>(
    backend: &B,
    validation: &DataValidation,
    sample_limit: usize,
) -> (bool, String) {
    let table = validation.table_name.as_str();
    let column = validation.column_name.as_str();
    match &validation.kind {
        ValidationKind::NotNull => match backend.count_nulls(table, column) {
            Ok(0) => (true, "no null values".to_string()),
            Ok(count) => (false, format!("{count} null values in {table}.{column}")),
            Err(err) => (false, err.to_string()),
        },
        ValidationKind::Range => {
            let Some((min, max)) = parse_range(validation.params.as_deref()) else {
                return (false, "RANGE requires params \"min,max\"".to_string());
            };
            match backend.count_outside_range(table, column, min, max) {
                Ok(0) => (true, format!("all values within [{min}, {max}]")),
                Ok(count) => {
                    (false, format!("{count} values outside [{min}, {max}] in {table}.{column}"))
                }
                Err(err) => (false, err.to_string()),
            }
        }
        ValidationKind::Regex => {
            let Some(raw) = validation.params.as_deref().filter(|p| !p.is_empty()) else {
                return (false, "REGEX requires a pattern parameter".to_string());
            };
            let pattern = match Regex::new(raw) {
                Ok(pattern) => pattern,
                Err(err) => return (false, format!("invalid pattern: {err}")),
            };
            match backend.sample_values(table, column, sample_limit) {
                Ok(values) => {
                    let mismatched =
                        values.iter().filter(|value| !pattern.is_match(value)).count();
                    if mismatched == 0 {
                        (true, format!("{} sampled values match", values.len()))
                    } else {
                        (false, format!("{mismatched} sampled values do not match pattern {raw}"))
                    }
                }
                Err(err) => (false, err.to_string()),
            }
        }
        ValidationKind::ForeignKey => {
            let Some((ref_table, ref_column)) = parse_pair(validation.params.as_deref()) else {
                return (false, "FOREIGN_KEY requires params \"ref_table,ref_column\"".to_string());
            };
            match backend.count_missing_references(table, column, &ref_table, &ref_column) {
                Ok(0) => (true, format!("all values present in {ref_table}.{ref_column}")),
                Ok(count) => (
                    false,
                    format!("{count} values missing from {ref_table}.{ref_column}"),
                ),
                Err(err) => (false, err.to_string()),
            }
        }
        ValidationKind::Unknown(raw) => (false, format!("Unknown validation type: {raw}")),
    }
}

// ============================================================================
// SECTION: Parameter Parsing
// ============================================================================

/// Parses `"min,max"` range parameters.
fn parse_range(params: Option<&str>) -> Option<(f64, f64)> {
    let (min, max) = split_pair(params)?;
    Some((min.parse().ok()?, max.parse().ok()?))
}

/// Parses `"ref_table,ref_column"` parameters.
fn parse_pair(params: Option<&str>) -> Option<(String, String)> {
    let (table, column) = split_pair(params)?;
    Some((table.to_string(), column.to_string()))
}

/// Splits a two-element comma parameter string.
fn split_pair(params: Option<&str>) -> Option<(&str, &str)> {
    let raw = params?;
    let (left, right) = raw.split_once(',')?;
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}
