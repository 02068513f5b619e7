// crates/rulewarden-core/src/runtime/engine.rs
// ============================================================================
// Module: Rulewarden Engine
// Description: The single value wiring store, backend, analyzer, and notifier.
// Purpose: Expose every public engine operation and own component wiring.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The engine is the single canonical execution path for Rulewarden. Every
//! surface (service endpoints, schedulers, tests) calls into these methods so
//! invariants and audit coverage hold everywhere. Components receive the
//! store and actor identity by explicit construction; there is no
//! package-level mutable state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::approval::ApprovalRoster;
use crate::core::approval::FINAL_STAGE_GROUP;
use crate::core::audit::AuditEntry;
use crate::core::audit::AuditQuery;
use crate::core::error::EngineError;
use crate::core::execution::ExecutionLogEntry;
use crate::core::execution::ExecutionReport;
use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::rule::Rule;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::Notifier;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::Store;
use crate::runtime::executor;
use crate::runtime::executor::ExecutionOptions;
use crate::runtime::graph::DependencyGraph;

// ============================================================================
// SECTION: Engine Settings
// ============================================================================

/// Engine-wide limits and identities.
///
/// # Invariants
/// - `admin_group` names the only group permitted on force paths and global
///   rule mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Group whose members hold admin privileges.
    pub admin_group: GroupName,
    /// Default lock TTL in milliseconds when callers pass none.
    pub default_lock_ttl_ms: i64,
    /// Scheduler cadence in milliseconds.
    pub scheduler_cadence_ms: u64,
    /// Row cap for sampled validations such as REGEX.
    pub validation_sample_limit: usize,
    /// Recipients for lifecycle notifications.
    pub notify_recipients: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            admin_group: GroupName::new("Admin"),
            default_lock_ttl_ms: 10 * 60 * 1_000,
            scheduler_cadence_ms: 60_000,
            validation_sample_limit: 500,
            notify_recipients: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Rulewarden engine wiring the component graph together.
pub struct Engine<S, B, A, N> {
    /// Persistence façade.
    pub(crate) store: S,
    /// Transactional SQL execution surface.
    pub(crate) backend: B,
    /// SQL analyzer implementation.
    pub(crate) analyzer: A,
    /// Best-effort notification sink.
    pub(crate) notifier: N,
    /// Engine-wide limits and identities.
    pub(crate) settings: EngineSettings,
    /// Approver roster used to build pipelines.
    pub(crate) roster: ApprovalRoster,
}

impl<S, B, A, N> Engine<S, B, A, N>
where
    S: Store,
    B: ExecutionBackend,
    A: SqlAnalyzer,
    N: Notifier,
{
    /// Creates a new engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when the roster is
    /// inconsistent.
    pub fn new(
        store: S,
        backend: B,
        analyzer: A,
        notifier: N,
        settings: EngineSettings,
        roster: ApprovalRoster,
    ) -> Result<Self, EngineError> {
        validate_roster(&roster)?;
        Ok(Self {
            store,
            backend,
            analyzer,
            notifier,
            settings,
            roster,
        })
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the approver roster.
    #[must_use]
    pub const fn roster(&self) -> &ApprovalRoster {
        &self.roster
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Loads a rule, rejecting when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the rule does not exist.
    pub fn rule(&self, rule_id: RuleId) -> Result<Rule, EngineError> {
        self.store
            .rule(rule_id)?
            .ok_or_else(|| EngineError::NotFound(format!("rule {rule_id}")))
    }

    /// Lists every rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the read fails.
    pub fn rules(&self) -> Result<Vec<Rule>, EngineError> {
        Ok(self.store.rules()?)
    }

    /// Lists audit entries matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the read fails.
    pub fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, EngineError> {
        Ok(self.store.audit_entries(query)?)
    }

    /// Lists the execution-log rows for a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the read fails.
    pub fn execution_logs(&self, rule_id: RuleId) -> Result<Vec<ExecutionLogEntry>, EngineError> {
        Ok(self.store.execution_logs(rule_id)?)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Executes rules in dependency order.
    ///
    /// With empty `start_ids` the traversal begins at the graph roots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when graph assembly or a store access fails;
    /// per-rule SQL failures are captured in the report instead.
    pub fn execute(
        &self,
        options: &ExecutionOptions,
        now: Timestamp,
    ) -> Result<ExecutionReport, EngineError> {
        let graph = DependencyGraph::build(&self.store)?;
        executor::execute(
            &self.store,
            &self.backend,
            &graph,
            options,
            self.settings.validation_sample_limit,
            now,
        )
    }

    /// Executes one rule immediately, without descending into the graph.
    ///
    /// This is the interactive run-now path: unlike [`Engine::execute`],
    /// which records per-rule failures in the execution log and keeps
    /// traversing, a failed gate or a non-passing probe comes back to the
    /// caller as an error. When the SQL runs, its execution-log row is
    /// appended pass or fail; a failed gate stops before the SQL and leaves
    /// only validation-log rows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ValidationFailed`] when a data validation for
    /// one of the rule's tables fails, and [`EngineError::ExecutionFailed`]
    /// when the rule's SQL returns a non-pass value or raises.
    pub fn execute_rule(
        &self,
        rule_id: RuleId,
        skip_validations: bool,
        now: Timestamp,
    ) -> Result<ExecutionLogEntry, EngineError> {
        let rule = self.rule(rule_id)?;
        if !skip_validations {
            let failures = executor::gate_validations(
                &self.store,
                &self.backend,
                &rule,
                self.settings.validation_sample_limit,
                now,
            )?;
            if !failures.is_empty() {
                return Err(EngineError::ValidationFailed {
                    rule_id,
                    message: failures.join("; "),
                });
            }
        }
        let entry = executor::run_rule(&self.backend, &rule, now);
        self.store.append_execution_log(&entry)?;
        if !entry.pass_flag {
            return Err(EngineError::ExecutionFailed {
                rule_id,
                message: entry.message,
            });
        }
        Ok(entry)
    }
}

// ============================================================================
// SECTION: Roster Validation
// ============================================================================

/// Validates roster consistency at engine construction.
fn validate_roster(roster: &ApprovalRoster) -> Result<(), EngineError> {
    if roster.final_approver.as_str().is_empty() {
        return Err(EngineError::InvariantViolation(
            "approval roster requires a final approver".to_string(),
        ));
    }
    let mut seen = std::collections::BTreeSet::new();
    for group in &roster.stage_order {
        if group.as_str() == FINAL_STAGE_GROUP {
            return Err(EngineError::InvariantViolation(
                "stage order must not name the terminal stage".to_string(),
            ));
        }
        if !seen.insert(group.clone()) {
            return Err(EngineError::InvariantViolation(format!(
                "stage order repeats group {group}"
            )));
        }
    }
    Ok(())
}
