// crates/rulewarden-core/src/interfaces/mod.rs
// ============================================================================
// Module: Rulewarden Interfaces
// Description: Backend-agnostic contracts for persistence, SQL, and email.
// Purpose: Define the surfaces the Rulewarden runtime integrates through.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with external systems without
//! embedding backend-specific details. The store exclusively owns persisted
//! rows; compound mutations carry their audit entry so implementations can
//! commit both atomically. Implementations must fail closed on missing or
//! invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::approval::ActionType;
use crate::core::approval::ApprovalRow;
use crate::core::audit::AuditEntry;
use crate::core::audit::AuditQuery;
use crate::core::execution::ExecutionLogEntry;
use crate::core::execution::ValidationLogEntry;
use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScheduleId;
use crate::core::identifiers::UserName;
use crate::core::identifiers::ValidationId;
use crate::core::lock::RuleLock;
use crate::core::rule::ColumnMapping;
use crate::core::rule::ColumnOp;
use crate::core::rule::GlobalCriticalLink;
use crate::core::rule::OperationKind;
use crate::core::rule::Rule;
use crate::core::rule::RuleConflict;
use crate::core::rule::TableDependency;
use crate::core::schedule::Schedule;
use crate::core::schedule::ScheduleStatus;
use crate::core::time::Timestamp;
use crate::core::validation::DataValidation;

// ============================================================================
// SECTION: SQL Analyzer
// ============================================================================

/// Qualified table reference returned by SQL analysis.
///
/// # Invariants
/// - `table` is unbracketed; a missing `schema` means the backend default.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Database qualifier, when present.
    pub database: Option<String>,
    /// Schema qualifier, when present.
    pub schema: Option<String>,
    /// Table name.
    pub table: String,
}

impl TableRef {
    /// Returns the schema-qualified name used in dependency rows.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.table),
            None => self.table.clone(),
        }
    }
}

/// Column usage returned by SQL analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnUse {
    /// Column name.
    pub column: String,
    /// Read or write usage.
    pub usage: ColumnOp,
}

/// Result of analyzing one rule's SQL text.
///
/// # Invariants
/// - `tables` contains every table the SQL references at execution time;
///   false positives are tolerated, false negatives are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlAnalysis {
    /// Operation kind derived from the leading keyword.
    pub operation_kind: OperationKind,
    /// Distinct referenced tables.
    pub tables: Vec<TableRef>,
    /// Referenced columns with read/write usage.
    pub columns: Vec<ColumnUse>,
}

/// SQL analyzer errors.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Analyzer could not process the SQL text.
    #[error("sql analysis failed: {0}")]
    Analysis(String),
}

/// Pluggable SQL analyzer deriving dependencies from rule SQL.
pub trait SqlAnalyzer {
    /// Analyzes the SQL text of a rule.
    ///
    /// A `None` or empty SQL with `has_decision_table` set maps to the
    /// decision-table operation kind.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the text cannot be analyzed.
    fn analyze(
        &self,
        sql: Option<&str>,
        has_decision_table: bool,
    ) -> Result<SqlAnalysis, AnalyzerError>;
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced row does not exist.
    #[error("store row not found: {0}")]
    NotFound(String),
    /// `(owner_group, rule_name)` uniqueness violated.
    #[error("store duplicate name: {0}")]
    DuplicateName(String),
    /// A schema constraint rejected the mutation.
    #[error("store constraint violation: {0}")]
    ConstraintViolation(String),
    /// The operation exceeded its deadline; the transaction was rolled back.
    #[error("store timeout: {0}")]
    Timeout(String),
    /// The backend is unavailable or failed.
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an atomic lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    /// The lock was inserted and is now held by the caller.
    Acquired(RuleLock),
    /// An unexpired lock is held by another user.
    HeldBy {
        /// Current lock owner.
        owner: UserName,
        /// Lock expiry timestamp.
        expires_at: Timestamp,
    },
}

/// Persistence façade over the relational backend.
///
/// Every compound mutation is applied in a single backend transaction; on
/// failure nothing is persisted. Reads return plain values; no live cursors
/// escape.
pub trait Store {
    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Loads a rule by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn rule(&self, rule_id: RuleId) -> Result<Option<Rule>, StoreError>;

    /// Loads a rule by its unique `(owner_group, name)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn rule_by_name(&self, owner_group: &GroupName, name: &str)
    -> Result<Option<Rule>, StoreError>;

    /// Lists every rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn rules(&self) -> Result<Vec<Rule>, StoreError>;

    /// Lists the direct children of a rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn children_of(&self, rule_id: RuleId) -> Result<Vec<Rule>, StoreError>;

    /// Inserts a rule, its dependency rows, and its audit entry atomically.
    ///
    /// Returns the assigned rule identifier; implementations record that
    /// identifier in the stored dependency and audit rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateName`] on a name collision and other
    /// [`StoreError`] variants when the write fails.
    fn insert_rule(
        &self,
        rule: &Rule,
        dependencies: &[TableDependency],
        audit: &AuditEntry,
    ) -> Result<RuleId, StoreError>;

    /// Updates a rule, optionally replacing its dependency rows, writing the
    /// audit entry in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_rule(
        &self,
        rule: &Rule,
        dependencies: Option<&[TableDependency]>,
        audit: &AuditEntry,
    ) -> Result<(), StoreError>;

    /// Physically removes a rule, its dependency and approval rows, writing
    /// the audit entry in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn remove_rule(&self, rule_id: RuleId, audit: &AuditEntry) -> Result<(), StoreError>;

    /// Lists the dependency rows recorded for a rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn table_dependencies(&self, rule_id: RuleId) -> Result<Vec<TableDependency>, StoreError>;

    // ------------------------------------------------------------------
    // Dependency Edges
    // ------------------------------------------------------------------

    /// Lists every global-critical link.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn global_critical_links(&self) -> Result<Vec<GlobalCriticalLink>, StoreError>;

    /// Inserts a global-critical link.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_global_critical_link(&self, link: &GlobalCriticalLink) -> Result<(), StoreError>;

    /// Lists every pairwise conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn conflicts(&self) -> Result<Vec<RuleConflict>, StoreError>;

    /// Inserts a pairwise conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_conflict(&self, conflict: &RuleConflict) -> Result<(), StoreError>;

    /// Lists every column mapping.
    ///
    /// Implementations return an empty set when the mapping store is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn column_mappings(&self) -> Result<Vec<ColumnMapping>, StoreError>;

    /// Inserts a column mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_column_mapping(&self, mapping: &ColumnMapping) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Approvals
    // ------------------------------------------------------------------

    /// Lists the approval rows for a `(rule, action_type)` pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
    ) -> Result<Vec<ApprovalRow>, StoreError>;

    /// Deletes any prior rows for the `(rule, action_type)` pipeline and
    /// inserts the given rows in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn replace_approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
        rows: &[ApprovalRow],
    ) -> Result<(), StoreError>;

    /// Applies one approval decision atomically: updates the decided row,
    /// writes the rule, and appends the audit entry in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn apply_approval(
        &self,
        rule: &Rule,
        row: &ApprovalRow,
        audit: &AuditEntry,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Locks
    // ------------------------------------------------------------------

    /// Atomically acquires the rule lock when no live lock exists.
    ///
    /// With `force` set, any existing lock is deactivated first. Expired
    /// locks are treated as absent and lazily deactivated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn try_acquire_lock(
        &self,
        lock: &RuleLock,
        now: Timestamp,
        force: bool,
    ) -> Result<LockAttempt, StoreError>;

    /// Deactivates the active lock on a rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn release_lock(&self, rule_id: RuleId) -> Result<(), StoreError>;

    /// Returns the live lock on a rule, treating expired locks as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn active_lock(&self, rule_id: RuleId, now: Timestamp) -> Result<Option<RuleLock>, StoreError>;

    // ------------------------------------------------------------------
    // Schedules
    // ------------------------------------------------------------------

    /// Inserts a schedule and its audit entry atomically.
    ///
    /// Returns the assigned schedule identifier; implementations record that
    /// identifier in the stored audit row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_schedule(
        &self,
        schedule: &Schedule,
        audit: &AuditEntry,
    ) -> Result<ScheduleId, StoreError>;

    /// Loads a schedule by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError>;

    /// Lists schedules still in the scheduled state with `fire_at` at or
    /// before the given time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn due_schedules(&self, now: Timestamp) -> Result<Vec<Schedule>, StoreError>;

    /// Updates a schedule's status, appending the audit entry (when one is
    /// supplied) in the same transaction.
    ///
    /// The scheduler's own mechanical advances pass no audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the schedule does not exist and
    /// other [`StoreError`] variants when the write fails.
    fn set_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        audit: Option<&AuditEntry>,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Validations
    // ------------------------------------------------------------------

    /// Lists the validations configured for a table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn validations_for_table(&self, table_name: &str)
    -> Result<Vec<DataValidation>, StoreError>;

    /// Inserts a data validation.
    ///
    /// Returns the assigned validation identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_validation(&self, validation: &DataValidation)
    -> Result<ValidationId, StoreError>;

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Appends an execution-log row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;

    /// Lists the execution-log rows for a rule, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn execution_logs(&self, rule_id: RuleId) -> Result<Vec<ExecutionLogEntry>, StoreError>;

    /// Appends a validation-log row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_validation_log(&self, entry: &ValidationLogEntry) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Lists audit entries matching the query, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError>;
}

// ============================================================================
// SECTION: Execution Backend
// ============================================================================

/// Execution backend errors.
///
/// # Invariants
/// - Missing-object failures are classified separately for operator feedback.
#[derive(Debug, Error)]
pub enum ExecutionBackendError {
    /// A referenced table or object does not exist.
    #[error("missing object: {0}")]
    MissingObject(String),
    /// The SQL raised at execution time.
    #[error("sql error: {0}")]
    Sql(String),
    /// The backend is unavailable.
    #[error("execution backend unavailable: {0}")]
    Unavailable(String),
}

/// First-row probe result of executing a rule's SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlProbe {
    /// Whether the statement returned at least one row.
    pub row_returned: bool,
    /// Integer value of the first column of the first row, when integral.
    pub first_value: Option<i64>,
    /// Records affected or returned by the statement.
    pub record_count: i64,
}

impl SqlProbe {
    /// Returns whether the probe passes: no rows returned, or the first
    /// column of the first row equals 1.
    #[must_use]
    pub const fn passes(&self) -> bool {
        !self.row_returned || matches!(self.first_value, Some(1))
    }
}

/// Transactional SQL execution surface for the executor and validations.
pub trait ExecutionBackend {
    /// Executes the rule SQL inside its own transaction, committing when the
    /// probe passes and rolling back otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionBackendError`] when execution raises; the
    /// transaction is rolled back before the error surfaces.
    fn execute_rule_sql(&self, sql: &str) -> Result<SqlProbe, ExecutionBackendError>;

    /// Counts rows holding NULL in the column.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionBackendError`] when the query fails.
    fn count_nulls(&self, table: &str, column: &str) -> Result<i64, ExecutionBackendError>;

    /// Counts rows with the column outside the inclusive range.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionBackendError`] when the query fails.
    fn count_outside_range(
        &self,
        table: &str,
        column: &str,
        min: f64,
        max: f64,
    ) -> Result<i64, ExecutionBackendError>;

    /// Samples up to `limit` non-null values of the column as text.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionBackendError`] when the query fails.
    fn sample_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>, ExecutionBackendError>;

    /// Counts rows in (table, column) without a matching (`ref_table`,
    /// `ref_column`) row.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionBackendError`] when the query fails.
    fn count_missing_references(
        &self,
        table: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
    ) -> Result<i64, ExecutionBackendError>;
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notifier errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Best-effort email sink invoked after lifecycle mutations.
///
/// Delivery errors are logged by callers and never fail the mutation.
pub trait Notifier {
    /// Sends a notification to the recipients.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails.
    fn notify(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), NotifyError>;
}
