// crates/rulewarden-core/src/runtime/executor.rs
// ============================================================================
// Module: Rulewarden Executor
// Description: Breadth-first, transaction-per-rule traversal of the DAG.
// Purpose: Run rules in dependency order, skipping descendants of critical
//          failures and gating on data validations.
// Dependencies: crate::{core, interfaces, runtime::{graph, validation}}
// ============================================================================

//! ## Overview
//! The executor walks the adjacency map breadth first with a FIFO queue, a
//! visited set, and a skipped set. Each rule's SQL runs in its own backend
//! transaction: pass means no row returned or the first column equals 1, and
//! every attempt appends an execution-log row. A failing critical rule marks
//! every reachable descendant skipped without executing it. Per-rule failures
//! never stop the surrounding traversal; cycles are broken by the first visit
//! winning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::time::Instant;

use crate::core::error::EngineError;
use crate::core::execution::ExecutionLogEntry;
use crate::core::execution::ExecutionReport;
use crate::core::identifiers::RuleId;
use crate::core::rule::CriticalScope;
use crate::core::rule::Rule;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::ExecutionBackendError;
use crate::interfaces::SqlProbe;
use crate::interfaces::Store;
use crate::runtime::graph::DependencyGraph;
use crate::runtime::validation;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Caller options for one executor traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Rules to start from; empty means the graph roots.
    pub start_ids: Vec<RuleId>,
    /// Whether to bypass the data-validation gate.
    pub skip_validations: bool,
}

impl ExecutionOptions {
    /// Creates options starting from the graph roots with validations on.
    #[must_use]
    pub const fn from_roots() -> Self {
        Self {
            start_ids: Vec::new(),
            skip_validations: false,
        }
    }

    /// Creates options starting from the given rules.
    #[must_use]
    pub fn starting_at(start_ids: Vec<RuleId>) -> Self {
        Self {
            start_ids,
            skip_validations: false,
        }
    }
}

// ============================================================================
// SECTION: Traversal
// ============================================================================

/// Executes rules breadth first over the adjacency map.
///
/// # Errors
///
/// Returns [`EngineError`] when a store access fails; per-rule SQL failures
/// are captured in the report and the execution log instead.
pub fn execute<S, B>(
    store: &S,
    backend: &B,
    graph: &DependencyGraph,
    options: &ExecutionOptions,
    sample_limit: usize,
    now: Timestamp,
) -> Result<ExecutionReport, EngineError>
where
    S: Store,
    B: ExecutionBackend,
{
    let mut queue: VecDeque<RuleId> = if options.start_ids.is_empty() {
        graph.roots().into()
    } else {
        options.start_ids.iter().copied().collect()
    };

    let mut visited = BTreeSet::new();
    let mut skipped = BTreeSet::new();
    let mut executed = Vec::new();
    let mut validation_failures = Vec::new();

    while let Some(rule_id) = queue.pop_front() {
        if skipped.contains(&rule_id) || !visited.insert(rule_id) {
            continue;
        }
        // A dangling edge (composite token naming a removed rule) still
        // gates its children; treat the missing node as trivially passing.
        let Some(rule) = store.rule(rule_id)? else {
            enqueue_children(graph, &skipped, &mut queue, rule_id);
            continue;
        };

        if !options.skip_validations {
            let failures = gate_validations(store, backend, &rule, sample_limit, now)?;
            if !failures.is_empty() {
                tracing::debug!(rule = %rule_id, "validation gate failed; skipping subtree");
                validation_failures.extend(failures);
                skipped.insert(rule_id);
                skipped.extend(graph.descendants(rule_id));
                continue;
            }
        }

        let entry = run_rule(backend, &rule, now);
        store.append_execution_log(&entry)?;

        if entry.pass_flag {
            executed.push(rule_id);
            enqueue_children(graph, &skipped, &mut queue, rule_id);
        } else {
            skipped.insert(rule_id);
            if is_critical(&rule) {
                skipped.extend(graph.descendants(rule_id));
            }
        }
    }

    Ok(ExecutionReport {
        executed,
        skipped: skipped.into_iter().collect(),
        validation_failures,
    })
}

/// Enqueues the outbound neighbors that are not already skipped.
fn enqueue_children(
    graph: &DependencyGraph,
    skipped: &BTreeSet<RuleId>,
    queue: &mut VecDeque<RuleId>,
    rule_id: RuleId,
) {
    for child in graph.children(rule_id) {
        if !skipped.contains(&child) {
            queue.push_back(child);
        }
    }
}

/// Returns whether a failure of this rule propagates skips.
fn is_critical(rule: &Rule) -> bool {
    (rule.critical_rule || rule.is_global) && rule.critical_scope != CriticalScope::None
}

// ============================================================================
// SECTION: Validation Gate
// ============================================================================

/// Runs every configured validation for the rule's dependency tables.
pub(crate) fn gate_validations<S, B>(
    store: &S,
    backend: &B,
    rule: &Rule,
    sample_limit: usize,
    now: Timestamp,
) -> Result<Vec<String>, EngineError>
where
    S: Store,
    B: ExecutionBackend,
{
    let mut tables = BTreeSet::new();
    for dependency in store.table_dependencies(rule.rule_id)? {
        tables.insert(dependency.table_name);
    }

    let mut failures = Vec::new();
    for table in tables {
        for configured in store.validations_for_table(&table)? {
            let entry = validation::run_validation(backend, &configured, sample_limit, now);
            store.append_validation_log(&entry)?;
            if !entry.passed {
                failures.push(format!(
                    "rule {}: {} on {}.{}: {}",
                    rule.rule_id, entry.kind, entry.table_name, entry.column_name, entry.message
                ));
            }
        }
    }
    Ok(failures)
}

// ============================================================================
// SECTION: Single-Rule Execution
// ============================================================================

/// Executes one rule's SQL in its own backend transaction and builds the
/// execution-log row for the attempt.
pub(crate) fn run_rule<B: ExecutionBackend>(
    backend: &B,
    rule: &Rule,
    now: Timestamp,
) -> ExecutionLogEntry {
    let started = Instant::now();
    let (pass_flag, message, record_count) = match &rule.sql {
        None => (true, "no sql to execute".to_string(), 0),
        Some(sql) => match backend.execute_rule_sql(sql) {
            Ok(probe) => probe_outcome(&probe),
            Err(err) => (false, classify_error(&err), 0),
        },
    };
    let elapsed_ms =
        i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    ExecutionLogEntry {
        rule_id: rule.rule_id,
        fired_at: now,
        pass_flag,
        message,
        record_count,
        elapsed_ms,
    }
}

/// Maps a probe result onto the pass flag, message, and record count.
fn probe_outcome(probe: &SqlProbe) -> (bool, String, i64) {
    if probe.passes() {
        (true, "pass".to_string(), probe.record_count)
    } else {
        let observed = probe
            .first_value
            .map_or_else(|| "a non-integer value".to_string(), |value| value.to_string());
        (false, format!("rule check returned {observed}"), probe.record_count)
    }
}

/// Renders a backend error, classifying missing objects for operators.
fn classify_error(err: &ExecutionBackendError) -> String {
    match err {
        ExecutionBackendError::MissingObject(object) => {
            format!("referenced table or object does not exist: {object}")
        }
        ExecutionBackendError::Sql(message) | ExecutionBackendError::Unavailable(message) => {
            message.clone()
        }
    }
}
