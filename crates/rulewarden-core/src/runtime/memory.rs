// crates/rulewarden-core/src/runtime/memory.rs
// ============================================================================
// Module: Rulewarden In-Memory Store
// Description: Mutex-guarded store and scripted backend for tests and demos.
// Purpose: Provide deterministic implementations without external deps.
// Dependencies: crate::{core, interfaces}, std
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`Store`] plus a
//! scripted [`ExecutionBackend`] whose probe outcomes are keyed by SQL text.
//! Both are deterministic and intended for tests and local demos, not
//! production use. Compound mutations hold one mutex for their whole scope,
//! which gives them the same all-or-nothing shape the durable store provides
//! with transactions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::approval::ActionType;
use crate::core::approval::ApprovalRow;
use crate::core::approval::ApprovedFlag;
use crate::core::audit::AuditEntry;
use crate::core::audit::AuditQuery;
use crate::core::execution::ExecutionLogEntry;
use crate::core::execution::ValidationLogEntry;
use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScheduleId;
use crate::core::identifiers::ValidationId;
use crate::core::lock::RuleLock;
use crate::core::rule::ColumnMapping;
use crate::core::rule::GlobalCriticalLink;
use crate::core::rule::Rule;
use crate::core::rule::RuleConflict;
use crate::core::rule::TableDependency;
use crate::core::schedule::Schedule;
use crate::core::schedule::ScheduleStatus;
use crate::core::time::Timestamp;
use crate::core::validation::DataValidation;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::ExecutionBackendError;
use crate::interfaces::LockAttempt;
use crate::interfaces::SqlProbe;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Mutable table state behind the store mutex.
#[derive(Debug, Default)]
struct MemoryTables {
    /// Rule rows by identifier.
    rules: BTreeMap<i64, Rule>,
    /// Dependency rows.
    dependencies: Vec<TableDependency>,
    /// Global-critical link rows.
    links: Vec<GlobalCriticalLink>,
    /// Conflict rows.
    conflicts: Vec<RuleConflict>,
    /// Column mapping rows.
    mappings: Vec<ColumnMapping>,
    /// Approval rows across every pipeline.
    approvals: Vec<ApprovalRow>,
    /// Lock rows, including deactivated history.
    locks: Vec<RuleLock>,
    /// Schedule rows by identifier.
    schedules: BTreeMap<i64, Schedule>,
    /// Configured data validations.
    validations: Vec<DataValidation>,
    /// Execution-log rows.
    execution_logs: Vec<ExecutionLogEntry>,
    /// Validation-log rows.
    validation_logs: Vec<ValidationLogEntry>,
    /// Audit rows.
    audit: Vec<AuditEntry>,
    /// Next rule identifier.
    next_rule_id: i64,
    /// Next schedule identifier.
    next_schedule_id: i64,
    /// Next validation identifier.
    next_validation_id: i64,
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory [`Store`] for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// Table state protected by a mutex.
    tables: Arc<Mutex<MemoryTables>>,
}

impl InMemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the table state, mapping poisoning onto a store error.
    fn guard(&self) -> Result<MutexGuard<'_, MemoryTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Lists the validation-log rows written so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    pub fn validation_logs(&self) -> Result<Vec<ValidationLogEntry>, StoreError> {
        Ok(self.guard()?.validation_logs.clone())
    }
}

impl Store for InMemoryStore {
    fn rule(&self, rule_id: RuleId) -> Result<Option<Rule>, StoreError> {
        Ok(self.guard()?.rules.get(&rule_id.as_i64()).cloned())
    }

    fn rule_by_name(
        &self,
        owner_group: &GroupName,
        name: &str,
    ) -> Result<Option<Rule>, StoreError> {
        Ok(self
            .guard()?
            .rules
            .values()
            .find(|rule| rule.owner_group == *owner_group && rule.name == name)
            .cloned())
    }

    fn rules(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.guard()?.rules.values().cloned().collect())
    }

    fn children_of(&self, rule_id: RuleId) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .guard()?
            .rules
            .values()
            .filter(|rule| rule.parent_rule_id == Some(rule_id))
            .cloned()
            .collect())
    }

    fn insert_rule(
        &self,
        rule: &Rule,
        dependencies: &[TableDependency],
        audit: &AuditEntry,
    ) -> Result<RuleId, StoreError> {
        let mut tables = self.guard()?;
        if tables
            .rules
            .values()
            .any(|existing| existing.owner_group == rule.owner_group && existing.name == rule.name)
        {
            return Err(StoreError::DuplicateName(format!(
                "{}/{}",
                rule.owner_group, rule.name
            )));
        }
        tables.next_rule_id += 1;
        let assigned = RuleId::new(tables.next_rule_id);
        let mut stored = rule.clone();
        stored.rule_id = assigned;
        tables.rules.insert(assigned.as_i64(), stored);
        for dependency in dependencies {
            let mut row = dependency.clone();
            row.rule_id = assigned;
            tables.dependencies.push(row);
        }
        let mut entry = audit.clone();
        entry.record_id = assigned.as_i64();
        tables.audit.push(entry);
        Ok(assigned)
    }

    fn update_rule(
        &self,
        rule: &Rule,
        dependencies: Option<&[TableDependency]>,
        audit: &AuditEntry,
    ) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        if !tables.rules.contains_key(&rule.rule_id.as_i64()) {
            return Err(StoreError::NotFound(format!("rule {}", rule.rule_id)));
        }
        tables.rules.insert(rule.rule_id.as_i64(), rule.clone());
        if let Some(rows) = dependencies {
            tables.dependencies.retain(|row| row.rule_id != rule.rule_id);
            for dependency in rows {
                let mut row = dependency.clone();
                row.rule_id = rule.rule_id;
                tables.dependencies.push(row);
            }
        }
        tables.audit.push(audit.clone());
        Ok(())
    }

    fn remove_rule(&self, rule_id: RuleId, audit: &AuditEntry) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        if tables.rules.remove(&rule_id.as_i64()).is_none() {
            return Err(StoreError::NotFound(format!("rule {rule_id}")));
        }
        tables.dependencies.retain(|row| row.rule_id != rule_id);
        tables.approvals.retain(|row| row.rule_id != rule_id);
        tables.locks.retain(|row| row.rule_id != rule_id);
        tables.audit.push(audit.clone());
        Ok(())
    }

    fn table_dependencies(&self, rule_id: RuleId) -> Result<Vec<TableDependency>, StoreError> {
        Ok(self
            .guard()?
            .dependencies
            .iter()
            .filter(|row| row.rule_id == rule_id)
            .cloned()
            .collect())
    }

    fn global_critical_links(&self) -> Result<Vec<GlobalCriticalLink>, StoreError> {
        Ok(self.guard()?.links.clone())
    }

    fn insert_global_critical_link(&self, link: &GlobalCriticalLink) -> Result<(), StoreError> {
        self.guard()?.links.push(*link);
        Ok(())
    }

    fn conflicts(&self) -> Result<Vec<RuleConflict>, StoreError> {
        Ok(self.guard()?.conflicts.clone())
    }

    fn insert_conflict(&self, conflict: &RuleConflict) -> Result<(), StoreError> {
        self.guard()?.conflicts.push(*conflict);
        Ok(())
    }

    fn column_mappings(&self) -> Result<Vec<ColumnMapping>, StoreError> {
        Ok(self.guard()?.mappings.clone())
    }

    fn insert_column_mapping(&self, mapping: &ColumnMapping) -> Result<(), StoreError> {
        self.guard()?.mappings.push(mapping.clone());
        Ok(())
    }

    fn approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
    ) -> Result<Vec<ApprovalRow>, StoreError> {
        let mut rows: Vec<ApprovalRow> = self
            .guard()?
            .approvals
            .iter()
            .filter(|row| row.rule_id == rule_id && row.action_type == action_type)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.approval_stage, &a.group_name, &a.username).cmp(&(
                b.approval_stage,
                &b.group_name,
                &b.username,
            ))
        });
        Ok(rows)
    }

    fn replace_approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
        rows: &[ApprovalRow],
    ) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        tables
            .approvals
            .retain(|row| !(row.rule_id == rule_id && row.action_type == action_type));
        tables.approvals.extend(rows.iter().cloned());
        Ok(())
    }

    fn apply_approval(
        &self,
        rule: &Rule,
        row: &ApprovalRow,
        audit: &AuditEntry,
    ) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        let Some(stored) = tables.approvals.iter_mut().find(|candidate| {
            candidate.rule_id == row.rule_id
                && candidate.action_type == row.action_type
                && candidate.group_name == row.group_name
                && candidate.username == row.username
                && candidate.approval_stage == row.approval_stage
                && candidate.approved_flag == ApprovedFlag::Pending
        }) else {
            return Err(StoreError::NotFound(format!(
                "pending approval for {} on rule {}",
                row.username, row.rule_id
            )));
        };
        stored.approved_flag = row.approved_flag;
        stored.decided_at = row.decided_at;
        tables.rules.insert(rule.rule_id.as_i64(), rule.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    fn try_acquire_lock(
        &self,
        lock: &RuleLock,
        now: Timestamp,
        force: bool,
    ) -> Result<LockAttempt, StoreError> {
        let mut tables = self.guard()?;
        for existing in tables.locks.iter_mut().filter(|l| l.rule_id == lock.rule_id) {
            if !existing.active {
                continue;
            }
            if existing.is_expired(now) {
                existing.active = false;
                continue;
            }
            if force {
                existing.active = false;
            } else {
                return Ok(LockAttempt::HeldBy {
                    owner: existing.locked_by.clone(),
                    expires_at: existing.expires_at,
                });
            }
        }
        tables.locks.push(lock.clone());
        Ok(LockAttempt::Acquired(lock.clone()))
    }

    fn release_lock(&self, rule_id: RuleId) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        for existing in tables.locks.iter_mut().filter(|l| l.rule_id == rule_id) {
            existing.active = false;
        }
        Ok(())
    }

    fn active_lock(&self, rule_id: RuleId, now: Timestamp) -> Result<Option<RuleLock>, StoreError> {
        let mut tables = self.guard()?;
        let mut live = None;
        for existing in tables.locks.iter_mut().filter(|l| l.rule_id == rule_id) {
            if existing.active && existing.is_expired(now) {
                existing.active = false;
            }
            if existing.is_live(now) {
                live = Some(existing.clone());
            }
        }
        Ok(live)
    }

    fn insert_schedule(
        &self,
        schedule: &Schedule,
        audit: &AuditEntry,
    ) -> Result<ScheduleId, StoreError> {
        let mut tables = self.guard()?;
        tables.next_schedule_id += 1;
        let assigned = ScheduleId::new(tables.next_schedule_id);
        let mut stored = schedule.clone();
        stored.schedule_id = assigned;
        tables.schedules.insert(assigned.as_i64(), stored);
        let mut entry = audit.clone();
        entry.record_id = assigned.as_i64();
        tables.audit.push(entry);
        Ok(assigned)
    }

    fn schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        Ok(self.guard()?.schedules.get(&schedule_id.as_i64()).cloned())
    }

    fn due_schedules(&self, now: Timestamp) -> Result<Vec<Schedule>, StoreError> {
        let mut due: Vec<Schedule> = self
            .guard()?
            .schedules
            .values()
            .filter(|schedule| {
                schedule.status == ScheduleStatus::Scheduled && schedule.fire_at <= now
            })
            .cloned()
            .collect();
        due.sort_by_key(|schedule| (schedule.fire_at, schedule.schedule_id));
        Ok(due)
    }

    fn set_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        audit: Option<&AuditEntry>,
    ) -> Result<(), StoreError> {
        let mut tables = self.guard()?;
        let Some(schedule) = tables.schedules.get_mut(&schedule_id.as_i64()) else {
            return Err(StoreError::NotFound(format!("schedule {schedule_id}")));
        };
        schedule.status = status;
        if let Some(entry) = audit {
            tables.audit.push(entry.clone());
        }
        Ok(())
    }

    fn validations_for_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<DataValidation>, StoreError> {
        Ok(self
            .guard()?
            .validations
            .iter()
            .filter(|validation| validation.table_name == table_name)
            .cloned()
            .collect())
    }

    fn insert_validation(
        &self,
        validation: &DataValidation,
    ) -> Result<ValidationId, StoreError> {
        let mut tables = self.guard()?;
        tables.next_validation_id += 1;
        let assigned = ValidationId::new(tables.next_validation_id);
        let mut stored = validation.clone();
        stored.validation_id = assigned;
        tables.validations.push(stored);
        Ok(assigned)
    }

    fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        self.guard()?.execution_logs.push(entry.clone());
        Ok(())
    }

    fn execution_logs(&self, rule_id: RuleId) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        Ok(self
            .guard()?
            .execution_logs
            .iter()
            .filter(|entry| entry.rule_id == rule_id)
            .cloned()
            .collect())
    }

    fn append_validation_log(&self, entry: &ValidationLogEntry) -> Result<(), StoreError> {
        self.guard()?.validation_logs.push(entry.clone());
        Ok(())
    }

    fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .guard()?
            .audit
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Scripted Backend
// ============================================================================

/// Scripted response for one SQL text.
#[derive(Debug, Clone)]
enum ScriptedResponse {
    /// Return this probe result.
    Probe(SqlProbe),
    /// Raise a SQL error.
    SqlError(String),
    /// Raise a missing-object error.
    MissingObject(String),
}

/// Mutable scripted state behind the backend mutex.
#[derive(Debug, Default)]
struct ScriptedState {
    /// Responses keyed by exact SQL text.
    responses: BTreeMap<String, ScriptedResponse>,
    /// Null counts keyed by (table, column).
    null_counts: BTreeMap<(String, String), i64>,
    /// Out-of-range counts keyed by (table, column).
    range_violations: BTreeMap<(String, String), i64>,
    /// Sample values keyed by (table, column).
    samples: BTreeMap<(String, String), Vec<String>>,
    /// Missing-reference counts keyed by (table, column).
    missing_references: BTreeMap<(String, String), i64>,
    /// SQL statements executed, in order.
    executed: Vec<String>,
}

/// Scripted [`ExecutionBackend`] keyed by SQL text, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    /// Scripted state protected by a mutex.
    state: Arc<Mutex<ScriptedState>>,
    /// Whether unscripted SQL passes instead of raising.
    pass_unscripted: bool,
}

impl ScriptedBackend {
    /// Creates a backend where unscripted SQL raises an error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend where unscripted SQL trivially passes.
    #[must_use]
    pub fn passing() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState::default())),
            pass_unscripted: true,
        }
    }

    /// Locks the scripted state.
    fn guard(&self) -> Result<MutexGuard<'_, ScriptedState>, ExecutionBackendError> {
        self.state
            .lock()
            .map_err(|_| ExecutionBackendError::Unavailable("backend mutex poisoned".to_string()))
    }

    /// Scripts a probe result for the SQL text.
    pub fn respond(&self, sql: impl Into<String>, probe: SqlProbe) {
        if let Ok(mut state) = self.state.lock() {
            state.responses.insert(sql.into(), ScriptedResponse::Probe(probe));
        }
    }

    /// Scripts a passing probe returning integer 1.
    pub fn respond_pass(&self, sql: impl Into<String>) {
        self.respond(
            sql,
            SqlProbe {
                row_returned: true,
                first_value: Some(1),
                record_count: 1,
            },
        );
    }

    /// Scripts a failing probe returning integer 0.
    pub fn respond_fail(&self, sql: impl Into<String>) {
        self.respond(
            sql,
            SqlProbe {
                row_returned: true,
                first_value: Some(0),
                record_count: 1,
            },
        );
    }

    /// Scripts a SQL error for the SQL text.
    pub fn respond_error(&self, sql: impl Into<String>, message: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.responses.insert(sql.into(), ScriptedResponse::SqlError(message.into()));
        }
    }

    /// Scripts a missing-object error for the SQL text.
    pub fn respond_missing_object(&self, sql: impl Into<String>, object: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state
                .responses
                .insert(sql.into(), ScriptedResponse::MissingObject(object.into()));
        }
    }

    /// Scripts the null count for a column.
    pub fn set_null_count(&self, table: impl Into<String>, column: impl Into<String>, count: i64) {
        if let Ok(mut state) = self.state.lock() {
            state.null_counts.insert((table.into(), column.into()), count);
        }
    }

    /// Scripts the out-of-range count for a column.
    pub fn set_range_violations(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        count: i64,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.range_violations.insert((table.into(), column.into()), count);
        }
    }

    /// Scripts sampled values for a column.
    pub fn set_samples(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        values: Vec<String>,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.samples.insert((table.into(), column.into()), values);
        }
    }

    /// Scripts the missing-reference count for a column.
    pub fn set_missing_references(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        count: i64,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.missing_references.insert((table.into(), column.into()), count);
        }
    }

    /// Returns the SQL statements executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().map(|state| state.executed.clone()).unwrap_or_default()
    }
}

impl ExecutionBackend for ScriptedBackend {
    fn execute_rule_sql(&self, sql: &str) -> Result<SqlProbe, ExecutionBackendError> {
        let mut state = self.guard()?;
        state.executed.push(sql.to_string());
        match state.responses.get(sql) {
            Some(ScriptedResponse::Probe(probe)) => Ok(*probe),
            Some(ScriptedResponse::SqlError(message)) => {
                Err(ExecutionBackendError::Sql(message.clone()))
            }
            Some(ScriptedResponse::MissingObject(object)) => {
                Err(ExecutionBackendError::MissingObject(object.clone()))
            }
            None if self.pass_unscripted => Ok(SqlProbe {
                row_returned: false,
                first_value: None,
                record_count: 0,
            }),
            None => Err(ExecutionBackendError::Sql(format!(
                "no scripted response for {sql}"
            ))),
        }
    }

    fn count_nulls(&self, table: &str, column: &str) -> Result<i64, ExecutionBackendError> {
        let state = self.guard()?;
        Ok(*state
            .null_counts
            .get(&(table.to_string(), column.to_string()))
            .unwrap_or(&0))
    }

    fn count_outside_range(
        &self,
        table: &str,
        column: &str,
        _min: f64,
        _max: f64,
    ) -> Result<i64, ExecutionBackendError> {
        let state = self.guard()?;
        Ok(*state
            .range_violations
            .get(&(table.to_string(), column.to_string()))
            .unwrap_or(&0))
    }

    fn sample_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>, ExecutionBackendError> {
        let state = self.guard()?;
        let mut values = state
            .samples
            .get(&(table.to_string(), column.to_string()))
            .cloned()
            .unwrap_or_default();
        values.truncate(limit);
        Ok(values)
    }

    fn count_missing_references(
        &self,
        table: &str,
        column: &str,
        _ref_table: &str,
        _ref_column: &str,
    ) -> Result<i64, ExecutionBackendError> {
        let state = self.guard()?;
        Ok(*state
            .missing_references
            .get(&(table.to_string(), column.to_string()))
            .unwrap_or(&0))
    }
}
