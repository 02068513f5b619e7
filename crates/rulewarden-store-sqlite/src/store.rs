// crates/rulewarden-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Rule Store
// Description: Durable Store implementation backed by SQLite WAL.
// Purpose: Persist rules, approvals, locks, schedules, and logs atomically.
// Dependencies: rulewarden-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The store owns the BRM schema and applies every compound mutation in a
//! single transaction, audit entry included; on failure nothing is
//! persisted. Database contents are untrusted on load: enum columns that
//! fail to parse surface as constraint violations rather than panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rulewarden_core::ActionType;
use rulewarden_core::Actor;
use rulewarden_core::ApprovalRow;
use rulewarden_core::ApprovedFlag;
use rulewarden_core::AuditAction;
use rulewarden_core::AuditEntry;
use rulewarden_core::AuditQuery;
use rulewarden_core::ColumnMapping;
use rulewarden_core::ColumnOp;
use rulewarden_core::CriticalScope;
use rulewarden_core::DataValidation;
use rulewarden_core::ExecutionLogEntry;
use rulewarden_core::GlobalCriticalLink;
use rulewarden_core::GroupName;
use rulewarden_core::LifecycleState;
use rulewarden_core::LockAttempt;
use rulewarden_core::OperationKind;
use rulewarden_core::Rule;
use rulewarden_core::RuleConflict;
use rulewarden_core::RuleId;
use rulewarden_core::RuleLock;
use rulewarden_core::RuleStatus;
use rulewarden_core::ApprovalStatus;
use rulewarden_core::Schedule;
use rulewarden_core::ScheduleId;
use rulewarden_core::ScheduleStatus;
use rulewarden_core::Store;
use rulewarden_core::StoreError;
use rulewarden_core::TableDependency;
use rulewarden_core::Timestamp;
use rulewarden_core::UserName;
use rulewarden_core::ValidationId;
use rulewarden_core::ValidationKind;
use rulewarden_core::ValidationLogEntry;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Column list used by every rule SELECT.
const RULE_COLUMNS: &str = "RULE_ID, RULE_NAME, SQL_TEXT, RULE_TYPE, OWNER_GROUP, \
     PARENT_RULE_ID, GROUP_ID, EFFECTIVE_START, EFFECTIVE_END, OPERATION_KIND, IS_GLOBAL, \
     CRITICAL_RULE, CRITICAL_SCOPE, CDC_TYPE, STATUS, APPROVAL_STATUS, LIFECYCLE_STATE, \
     VERSION, CREATED_BY, CREATED_AT, UPDATED_BY, UPDATED_AT, DECISION_TABLE_ID, LOGIC_EXPR";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Durability trade-off applied to the store connection.
///
/// One knob covers both the journal and fsync pragmas: rule stores either
/// hold production state and must survive power loss, or are throwaway
/// scratch databases for tests and demos. There is deliberately no way to
/// mix WAL with disabled syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityProfile {
    /// Write-ahead log with full fsync; survives power loss.
    #[default]
    Durable,
    /// Write-ahead log with relaxed fsync; faster commits, a crash may lose
    /// the most recent transactions but never corrupts the file.
    Relaxed,
    /// Rollback journal with relaxed fsync, for short-lived databases.
    Scratch,
}

impl DurabilityProfile {
    /// Returns the journal pragma this profile applies.
    pub(crate) const fn journal_pragma(self) -> &'static str {
        match self {
            Self::Durable | Self::Relaxed => "wal",
            Self::Scratch => "delete",
        }
    }

    /// Returns the synchronous pragma this profile applies.
    pub(crate) const fn sync_pragma(self) -> &'static str {
        match self {
            Self::Durable => "full",
            Self::Relaxed | Self::Scratch => "normal",
        }
    }
}

/// Configuration for the `SQLite` rule store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Durability trade-off for the connection pragmas.
    #[serde(default)]
    pub durability: DurabilityProfile,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => {
                Self::Unavailable(message)
            }
            SqliteStoreError::Invalid(message) => Self::ConstraintViolation(message),
        }
    }
}

/// Classifies a rusqlite error onto the store taxonomy.
fn db_err(err: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = err {
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return StoreError::Timeout(err.to_string());
            }
            ErrorCode::ConstraintViolation => {
                return StoreError::ConstraintViolation(err.to_string());
            }
            _ => {}
        }
    }
    StoreError::Unavailable(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed rule store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Compound mutations are one transaction each.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    pub(crate) connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an `SQLite`-backed store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.path.as_os_str().is_empty() {
            return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
        }
        let connection =
            Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::from_connection(connection, config)
    }

    /// Opens an in-memory store, for tests and demos.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when initialization fails.
    pub fn in_memory() -> Result<Self, SqliteStoreError> {
        let config = SqliteStoreConfig {
            path: PathBuf::from(":memory:"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            durability: DurabilityProfile::Scratch,
        };
        let connection = Connection::open_in_memory()
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::from_connection(connection, &config)
    }

    /// Applies pragmas and schema to a fresh connection.
    fn from_connection(
        mut connection: Connection,
        config: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        connection
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "journal_mode", config.durability.journal_pragma())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "synchronous", config.durability.sync_pragma())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .pragma_update(None, "foreign_keys", "on")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection, mapping poisoning onto a store error.
    pub(crate) fn guard(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Unavailable("store connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates the BRM schema when the store file is new.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx =
        connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS BRM_RULES (
                    RULE_ID INTEGER PRIMARY KEY AUTOINCREMENT,
                    RULE_NAME TEXT NOT NULL,
                    SQL_TEXT TEXT,
                    RULE_TYPE TEXT NOT NULL,
                    OWNER_GROUP TEXT NOT NULL,
                    PARENT_RULE_ID INTEGER,
                    GROUP_ID INTEGER,
                    EFFECTIVE_START INTEGER,
                    EFFECTIVE_END INTEGER,
                    OPERATION_KIND TEXT NOT NULL,
                    IS_GLOBAL INTEGER NOT NULL,
                    CRITICAL_RULE INTEGER NOT NULL,
                    CRITICAL_SCOPE TEXT NOT NULL,
                    CDC_TYPE TEXT,
                    STATUS TEXT NOT NULL,
                    APPROVAL_STATUS TEXT NOT NULL,
                    LIFECYCLE_STATE TEXT NOT NULL,
                    VERSION INTEGER NOT NULL,
                    CREATED_BY TEXT NOT NULL,
                    CREATED_AT INTEGER NOT NULL,
                    UPDATED_BY TEXT NOT NULL,
                    UPDATED_AT INTEGER NOT NULL,
                    DECISION_TABLE_ID INTEGER,
                    LOGIC_EXPR TEXT,
                    UNIQUE (OWNER_GROUP, RULE_NAME)
                );
                CREATE INDEX IF NOT EXISTS idx_brm_rules_parent
                    ON BRM_RULES (PARENT_RULE_ID);
                CREATE TABLE IF NOT EXISTS BRM_RULE_TABLE_DEPENDENCIES (
                    RULE_ID INTEGER NOT NULL,
                    DATABASE_NAME TEXT,
                    TABLE_NAME TEXT NOT NULL,
                    COLUMN_NAME TEXT,
                    COLUMN_OP TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_brm_dependencies_rule
                    ON BRM_RULE_TABLE_DEPENDENCIES (RULE_ID);
                CREATE TABLE IF NOT EXISTS BRM_RULE_APPROVALS (
                    RULE_ID INTEGER NOT NULL,
                    GROUP_NAME TEXT NOT NULL,
                    USERNAME TEXT NOT NULL,
                    APPROVED_FLAG INTEGER NOT NULL,
                    APPROVAL_STAGE INTEGER NOT NULL,
                    ACTION_TYPE TEXT NOT NULL,
                    DECIDED_AT INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_brm_approvals_rule
                    ON BRM_RULE_APPROVALS (RULE_ID, ACTION_TYPE);
                CREATE TABLE IF NOT EXISTS BRM_RULE_LOCKS (
                    RULE_ID INTEGER NOT NULL,
                    LOCKED_BY TEXT NOT NULL,
                    LOCK_TIMESTAMP INTEGER NOT NULL,
                    EXPIRY_TIMESTAMP INTEGER NOT NULL,
                    FORCE_LOCK INTEGER NOT NULL,
                    ACTIVE_LOCK INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_brm_locks_rule
                    ON BRM_RULE_LOCKS (RULE_ID, ACTIVE_LOCK);
                CREATE TABLE IF NOT EXISTS BRM_GLOBAL_CRITICAL_LINKS (
                    GCR_RULE_ID INTEGER NOT NULL,
                    TARGET_RULE_ID INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS BRM_RULE_CONFLICTS (
                    RULE_ID1 INTEGER NOT NULL,
                    RULE_ID2 INTEGER NOT NULL,
                    PRIORITY1 INTEGER NOT NULL,
                    PRIORITY2 INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS BRM_COLUMN_MAPPINGS (
                    RULE_ID INTEGER NOT NULL,
                    MAPPED_RULE_ID INTEGER NOT NULL,
                    COLUMN_NAME TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS BRM_DATA_VALIDATIONS (
                    VALIDATION_ID INTEGER PRIMARY KEY AUTOINCREMENT,
                    TABLE_NAME TEXT NOT NULL,
                    COLUMN_NAME TEXT NOT NULL,
                    VALIDATION_TYPE TEXT NOT NULL,
                    PARAMS TEXT
                );
                CREATE TABLE IF NOT EXISTS BRM_VALIDATION_LOGS (
                    VALIDATION_ID INTEGER NOT NULL,
                    TABLE_NAME TEXT NOT NULL,
                    COLUMN_NAME TEXT NOT NULL,
                    VALIDATION_TYPE TEXT NOT NULL,
                    PARAMS TEXT,
                    RESULT_FLAG INTEGER NOT NULL,
                    MESSAGE TEXT NOT NULL,
                    VALIDATION_TIMESTAMP INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS RULE_SCHEDULES (
                    SCHEDULE_ID INTEGER PRIMARY KEY AUTOINCREMENT,
                    RULE_ID INTEGER NOT NULL,
                    SCHEDULE_TIME INTEGER NOT NULL,
                    STATUS TEXT NOT NULL,
                    RUN_DATA_VALIDATIONS INTEGER NOT NULL,
                    CREATED_AT INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_rule_schedules_due
                    ON RULE_SCHEDULES (STATUS, SCHEDULE_TIME);
                CREATE TABLE IF NOT EXISTS RULE_EXECUTION_LOGS (
                    RULE_ID INTEGER NOT NULL,
                    EXECUTION_TIMESTAMP INTEGER NOT NULL,
                    PASS_FLAG INTEGER NOT NULL,
                    MESSAGE TEXT NOT NULL,
                    RECORD_COUNT INTEGER NOT NULL,
                    EXECUTION_TIME_MS INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_rule_execution_logs_rule
                    ON RULE_EXECUTION_LOGS (RULE_ID);
                CREATE TABLE IF NOT EXISTS BRM_AUDIT_LOG (
                    ACTION TEXT NOT NULL,
                    TABLE_NAME TEXT NOT NULL,
                    RECORD_ID INTEGER NOT NULL,
                    ACTION_BY TEXT NOT NULL,
                    ACTION_GROUP TEXT NOT NULL,
                    OLD_DATA TEXT,
                    NEW_DATA TEXT,
                    ACTION_TIMESTAMP INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_brm_audit_record
                    ON BRM_AUDIT_LOG (TABLE_NAME, RECORD_ID);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteStoreError::Invalid(format!(
                "unsupported store schema version {other}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw rule row before enum parsing.
struct RawRule {
    /// RULE_ID column.
    rule_id: i64,
    /// RULE_NAME column.
    name: String,
    /// SQL_TEXT column.
    sql: Option<String>,
    /// RULE_TYPE column.
    rule_type: String,
    /// OWNER_GROUP column.
    owner_group: String,
    /// PARENT_RULE_ID column.
    parent_rule_id: Option<i64>,
    /// GROUP_ID column.
    group_id: Option<i64>,
    /// EFFECTIVE_START column.
    effective_start: Option<i64>,
    /// EFFECTIVE_END column.
    effective_end: Option<i64>,
    /// OPERATION_KIND column.
    operation_kind: String,
    /// IS_GLOBAL column.
    is_global: bool,
    /// CRITICAL_RULE column.
    critical_rule: bool,
    /// CRITICAL_SCOPE column.
    critical_scope: String,
    /// CDC_TYPE column.
    cdc_type: Option<String>,
    /// STATUS column.
    status: String,
    /// APPROVAL_STATUS column.
    approval_status: String,
    /// LIFECYCLE_STATE column.
    lifecycle_state: String,
    /// VERSION column.
    version: i64,
    /// CREATED_BY column.
    created_by: String,
    /// CREATED_AT column.
    created_at: i64,
    /// UPDATED_BY column.
    updated_by: String,
    /// UPDATED_AT column.
    updated_at: i64,
    /// DECISION_TABLE_ID column.
    decision_table_id: Option<i64>,
    /// LOGIC_EXPR column.
    logic_expr: Option<String>,
}

/// Reads one rule row in [`RULE_COLUMNS`] order.
fn read_raw_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRule> {
    Ok(RawRule {
        rule_id: row.get(0)?,
        name: row.get(1)?,
        sql: row.get(2)?,
        rule_type: row.get(3)?,
        owner_group: row.get(4)?,
        parent_rule_id: row.get(5)?,
        group_id: row.get(6)?,
        effective_start: row.get(7)?,
        effective_end: row.get(8)?,
        operation_kind: row.get(9)?,
        is_global: row.get(10)?,
        critical_rule: row.get(11)?,
        critical_scope: row.get(12)?,
        cdc_type: row.get(13)?,
        status: row.get(14)?,
        approval_status: row.get(15)?,
        lifecycle_state: row.get(16)?,
        version: row.get(17)?,
        created_by: row.get(18)?,
        created_at: row.get(19)?,
        updated_by: row.get(20)?,
        updated_at: row.get(21)?,
        decision_table_id: row.get(22)?,
        logic_expr: row.get(23)?,
    })
}

/// Parses an enum column, rejecting unknown values.
fn parse_enum<T>(parsed: Option<T>, column: &str, raw: &str) -> Result<T, StoreError> {
    parsed.ok_or_else(|| {
        StoreError::ConstraintViolation(format!("unknown {column} value {raw}"))
    })
}

impl RawRule {
    /// Converts the raw row into a typed rule.
    fn into_rule(self) -> Result<Rule, StoreError> {
        Ok(Rule {
            rule_id: RuleId::new(self.rule_id),
            name: self.name,
            sql: self.sql,
            rule_type: self.rule_type,
            owner_group: GroupName::new(self.owner_group),
            parent_rule_id: self.parent_rule_id.map(RuleId::new),
            group_id: self.group_id,
            effective_start: self.effective_start.map(Timestamp::from_unix_millis),
            effective_end: self.effective_end.map(Timestamp::from_unix_millis),
            operation_kind: parse_enum(
                OperationKind::parse(&self.operation_kind),
                "OPERATION_KIND",
                &self.operation_kind,
            )?,
            is_global: self.is_global,
            critical_rule: self.critical_rule,
            critical_scope: parse_enum(
                CriticalScope::parse(&self.critical_scope),
                "CRITICAL_SCOPE",
                &self.critical_scope,
            )?,
            cdc_type: self.cdc_type,
            status: parse_enum(RuleStatus::parse(&self.status), "STATUS", &self.status)?,
            approval_status: parse_enum(
                ApprovalStatus::parse(&self.approval_status),
                "APPROVAL_STATUS",
                &self.approval_status,
            )?,
            lifecycle_state: parse_enum(
                LifecycleState::parse(&self.lifecycle_state),
                "LIFECYCLE_STATE",
                &self.lifecycle_state,
            )?,
            version: self.version,
            created_by: UserName::new(self.created_by),
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_by: UserName::new(self.updated_by),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
            decision_table_id: self.decision_table_id,
            logic_expr: self.logic_expr,
        })
    }
}

/// Writes the non-identity rule columns shared by insert and update.
fn rule_params(rule: &Rule) -> [Box<dyn rusqlite::ToSql>; 23] {
    [
        Box::new(rule.name.clone()),
        Box::new(rule.sql.clone()),
        Box::new(rule.rule_type.clone()),
        Box::new(rule.owner_group.as_str().to_string()),
        Box::new(rule.parent_rule_id.map(RuleId::as_i64)),
        Box::new(rule.group_id),
        Box::new(rule.effective_start.map(Timestamp::as_unix_millis)),
        Box::new(rule.effective_end.map(Timestamp::as_unix_millis)),
        Box::new(rule.operation_kind.as_str()),
        Box::new(rule.is_global),
        Box::new(rule.critical_rule),
        Box::new(rule.critical_scope.as_str()),
        Box::new(rule.cdc_type.clone()),
        Box::new(rule.status.as_str()),
        Box::new(rule.approval_status.as_str()),
        Box::new(rule.lifecycle_state.as_str()),
        Box::new(rule.version),
        Box::new(rule.created_by.as_str().to_string()),
        Box::new(rule.created_at.as_unix_millis()),
        Box::new(rule.updated_by.as_str().to_string()),
        Box::new(rule.updated_at.as_unix_millis()),
        Box::new(rule.decision_table_id),
        Box::new(rule.logic_expr.clone()),
    ]
}

/// Inserts one audit entry inside an open transaction.
fn insert_audit(tx: &Transaction<'_>, entry: &AuditEntry) -> Result<(), StoreError> {
    let old_data = entry
        .old_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| StoreError::ConstraintViolation(err.to_string()))?;
    let new_data = entry
        .new_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| StoreError::ConstraintViolation(err.to_string()))?;
    tx.execute(
        "INSERT INTO BRM_AUDIT_LOG (ACTION, TABLE_NAME, RECORD_ID, ACTION_BY, ACTION_GROUP, \
         OLD_DATA, NEW_DATA, ACTION_TIMESTAMP) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.action.as_str(),
            entry.table_name,
            entry.record_id,
            entry.actor.user.as_str(),
            entry.actor.group.as_str(),
            old_data,
            new_data,
            entry.at.as_unix_millis(),
        ],
    )
    .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Inserts dependency rows for a rule inside an open transaction.
fn insert_dependencies(
    tx: &Transaction<'_>,
    rule_id: RuleId,
    dependencies: &[TableDependency],
) -> Result<(), StoreError> {
    for dependency in dependencies {
        tx.execute(
            "INSERT INTO BRM_RULE_TABLE_DEPENDENCIES \
             (RULE_ID, DATABASE_NAME, TABLE_NAME, COLUMN_NAME, COLUMN_OP) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rule_id.as_i64(),
                dependency.database_name,
                dependency.table_name,
                dependency.column_name,
                dependency.column_op.as_str(),
            ],
        )
        .map_err(|err| db_err(&err))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Store Implementation
// ============================================================================

impl Store for SqliteStore {
    fn rule(&self, rule_id: RuleId) -> Result<Option<Rule>, StoreError> {
        let guard = self.guard()?;
        let raw = guard
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM BRM_RULES WHERE RULE_ID = ?1"),
                params![rule_id.as_i64()],
                read_raw_rule,
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        raw.map(RawRule::into_rule).transpose()
    }

    fn rule_by_name(
        &self,
        owner_group: &GroupName,
        name: &str,
    ) -> Result<Option<Rule>, StoreError> {
        let guard = self.guard()?;
        let raw = guard
            .query_row(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM BRM_RULES WHERE OWNER_GROUP = ?1 AND RULE_NAME = ?2"
                ),
                params![owner_group.as_str(), name],
                read_raw_rule,
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        raw.map(RawRule::into_rule).transpose()
    }

    fn rules(&self) -> Result<Vec<Rule>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(&format!("SELECT {RULE_COLUMNS} FROM BRM_RULES ORDER BY RULE_ID"))
            .map_err(|err| db_err(&err))?;
        let raw_rows = statement
            .query_map(params![], read_raw_rule)
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<RawRule>>>()
            .map_err(|err| db_err(&err))?;
        raw_rows.into_iter().map(RawRule::into_rule).collect()
    }

    fn children_of(&self, rule_id: RuleId) -> Result<Vec<Rule>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM BRM_RULES WHERE PARENT_RULE_ID = ?1 ORDER BY RULE_ID"
            ))
            .map_err(|err| db_err(&err))?;
        let raw_rows = statement
            .query_map(params![rule_id.as_i64()], read_raw_rule)
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<RawRule>>>()
            .map_err(|err| db_err(&err))?;
        raw_rows.into_iter().map(RawRule::into_rule).collect()
    }

    fn insert_rule(
        &self,
        rule: &Rule,
        dependencies: &[TableDependency],
        audit: &AuditEntry,
    ) -> Result<RuleId, StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        let duplicate: Option<i64> = tx
            .query_row(
                "SELECT RULE_ID FROM BRM_RULES WHERE OWNER_GROUP = ?1 AND RULE_NAME = ?2",
                params![rule.owner_group.as_str(), rule.name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        if duplicate.is_some() {
            return Err(StoreError::DuplicateName(format!(
                "{}/{}",
                rule.owner_group, rule.name
            )));
        }

        let columns = rule_params(rule);
        let placeholders = "?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23";
        tx.execute(
            &format!(
                "INSERT INTO BRM_RULES (RULE_NAME, SQL_TEXT, RULE_TYPE, OWNER_GROUP, \
                 PARENT_RULE_ID, GROUP_ID, EFFECTIVE_START, EFFECTIVE_END, OPERATION_KIND, \
                 IS_GLOBAL, CRITICAL_RULE, CRITICAL_SCOPE, CDC_TYPE, STATUS, APPROVAL_STATUS, \
                 LIFECYCLE_STATE, VERSION, CREATED_BY, CREATED_AT, UPDATED_BY, UPDATED_AT, \
                 DECISION_TABLE_ID, LOGIC_EXPR) VALUES ({placeholders})"
            ),
            rusqlite::params_from_iter(columns.iter().map(|column| &**column)),
        )
        .map_err(|err| db_err(&err))?;
        let assigned = RuleId::new(tx.last_insert_rowid());

        insert_dependencies(&tx, assigned, dependencies)?;
        let mut entry = audit.clone();
        entry.record_id = assigned.as_i64();
        insert_audit(&tx, &entry)?;

        tx.commit().map_err(|err| db_err(&err))?;
        Ok(assigned)
    }

    fn update_rule(
        &self,
        rule: &Rule,
        dependencies: Option<&[TableDependency]>,
        audit: &AuditEntry,
    ) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        let columns = rule_params(rule);
        let changed = tx
            .execute(
                "UPDATE BRM_RULES SET RULE_NAME = ?1, SQL_TEXT = ?2, RULE_TYPE = ?3, \
                 OWNER_GROUP = ?4, PARENT_RULE_ID = ?5, GROUP_ID = ?6, EFFECTIVE_START = ?7, \
                 EFFECTIVE_END = ?8, OPERATION_KIND = ?9, IS_GLOBAL = ?10, CRITICAL_RULE = ?11, \
                 CRITICAL_SCOPE = ?12, CDC_TYPE = ?13, STATUS = ?14, APPROVAL_STATUS = ?15, \
                 LIFECYCLE_STATE = ?16, VERSION = ?17, CREATED_BY = ?18, CREATED_AT = ?19, \
                 UPDATED_BY = ?20, UPDATED_AT = ?21, DECISION_TABLE_ID = ?22, LOGIC_EXPR = ?23 \
                 WHERE RULE_ID = ?24",
                rusqlite::params_from_iter(
                    columns
                        .iter()
                        .map(|column| &**column)
                        .chain(std::iter::once(&rule.rule_id.as_i64() as &dyn rusqlite::ToSql)),
                ),
            )
            .map_err(|err| db_err(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("rule {}", rule.rule_id)));
        }

        if let Some(rows) = dependencies {
            tx.execute(
                "DELETE FROM BRM_RULE_TABLE_DEPENDENCIES WHERE RULE_ID = ?1",
                params![rule.rule_id.as_i64()],
            )
            .map_err(|err| db_err(&err))?;
            insert_dependencies(&tx, rule.rule_id, rows)?;
        }
        insert_audit(&tx, audit)?;

        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn remove_rule(&self, rule_id: RuleId, audit: &AuditEntry) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        let removed = tx
            .execute("DELETE FROM BRM_RULES WHERE RULE_ID = ?1", params![rule_id.as_i64()])
            .map_err(|err| db_err(&err))?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("rule {rule_id}")));
        }
        tx.execute(
            "DELETE FROM BRM_RULE_TABLE_DEPENDENCIES WHERE RULE_ID = ?1",
            params![rule_id.as_i64()],
        )
        .map_err(|err| db_err(&err))?;
        tx.execute("DELETE FROM BRM_RULE_APPROVALS WHERE RULE_ID = ?1", params![rule_id.as_i64()])
            .map_err(|err| db_err(&err))?;
        tx.execute("DELETE FROM BRM_RULE_LOCKS WHERE RULE_ID = ?1", params![rule_id.as_i64()])
            .map_err(|err| db_err(&err))?;
        insert_audit(&tx, audit)?;

        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn table_dependencies(&self, rule_id: RuleId) -> Result<Vec<TableDependency>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT RULE_ID, DATABASE_NAME, TABLE_NAME, COLUMN_NAME, COLUMN_OP \
                 FROM BRM_RULE_TABLE_DEPENDENCIES WHERE RULE_ID = ?1 ORDER BY rowid",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![rule_id.as_i64()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        rows.into_iter()
            .map(|(id, database_name, table_name, column_name, op)| {
                Ok(TableDependency {
                    rule_id: RuleId::new(id),
                    database_name,
                    table_name,
                    column_name,
                    column_op: parse_enum(ColumnOp::parse(&op), "COLUMN_OP", &op)?,
                })
            })
            .collect()
    }

    fn global_critical_links(&self) -> Result<Vec<GlobalCriticalLink>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT GCR_RULE_ID, TARGET_RULE_ID FROM BRM_GLOBAL_CRITICAL_LINKS ORDER BY rowid",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![], |row| {
                Ok(GlobalCriticalLink {
                    gcr_rule_id: RuleId::new(row.get(0)?),
                    target_rule_id: RuleId::new(row.get(1)?),
                })
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        Ok(rows)
    }

    fn insert_global_critical_link(&self, link: &GlobalCriticalLink) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO BRM_GLOBAL_CRITICAL_LINKS (GCR_RULE_ID, TARGET_RULE_ID) \
                 VALUES (?1, ?2)",
                params![link.gcr_rule_id.as_i64(), link.target_rule_id.as_i64()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn conflicts(&self) -> Result<Vec<RuleConflict>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT RULE_ID1, RULE_ID2, PRIORITY1, PRIORITY2 FROM BRM_RULE_CONFLICTS \
                 ORDER BY rowid",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![], |row| {
                Ok(RuleConflict {
                    rule_id1: RuleId::new(row.get(0)?),
                    rule_id2: RuleId::new(row.get(1)?),
                    priority1: row.get(2)?,
                    priority2: row.get(3)?,
                })
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        Ok(rows)
    }

    fn insert_conflict(&self, conflict: &RuleConflict) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO BRM_RULE_CONFLICTS (RULE_ID1, RULE_ID2, PRIORITY1, PRIORITY2) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    conflict.rule_id1.as_i64(),
                    conflict.rule_id2.as_i64(),
                    conflict.priority1,
                    conflict.priority2,
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn column_mappings(&self) -> Result<Vec<ColumnMapping>, StoreError> {
        let guard = self.guard()?;
        let mut statement = match guard.prepare(
            "SELECT RULE_ID, MAPPED_RULE_ID, COLUMN_NAME FROM BRM_COLUMN_MAPPINGS ORDER BY rowid",
        ) {
            Ok(statement) => statement,
            // Deployments predating the mapping table degrade to an empty set.
            Err(err) if err.to_string().contains("no such table") => return Ok(Vec::new()),
            Err(err) => return Err(db_err(&err)),
        };
        let rows = statement
            .query_map(params![], |row| {
                Ok(ColumnMapping {
                    rule_id: RuleId::new(row.get(0)?),
                    mapped_rule_id: RuleId::new(row.get(1)?),
                    column_name: row.get(2)?,
                })
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        Ok(rows)
    }

    fn insert_column_mapping(&self, mapping: &ColumnMapping) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO BRM_COLUMN_MAPPINGS (RULE_ID, MAPPED_RULE_ID, COLUMN_NAME) \
                 VALUES (?1, ?2, ?3)",
                params![
                    mapping.rule_id.as_i64(),
                    mapping.mapped_rule_id.as_i64(),
                    mapping.column_name,
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
    ) -> Result<Vec<ApprovalRow>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT RULE_ID, GROUP_NAME, USERNAME, APPROVED_FLAG, APPROVAL_STAGE, \
                 ACTION_TYPE, DECIDED_AT FROM BRM_RULE_APPROVALS \
                 WHERE RULE_ID = ?1 AND ACTION_TYPE = ?2 \
                 ORDER BY APPROVAL_STAGE, GROUP_NAME, USERNAME",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![rule_id.as_i64(), action_type.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        rows.into_iter()
            .map(|(id, group, user, flag, stage, action, decided_at)| {
                Ok(ApprovalRow {
                    rule_id: RuleId::new(id),
                    group_name: GroupName::new(group),
                    username: UserName::new(user),
                    approved_flag: parse_enum(
                        ApprovedFlag::from_i64(flag),
                        "APPROVED_FLAG",
                        &flag.to_string(),
                    )?,
                    approval_stage: stage,
                    action_type: parse_enum(ActionType::parse(&action), "ACTION_TYPE", &action)?,
                    decided_at: decided_at.map(Timestamp::from_unix_millis),
                })
            })
            .collect()
    }

    fn replace_approvals(
        &self,
        rule_id: RuleId,
        action_type: ActionType,
        rows: &[ApprovalRow],
    ) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        tx.execute(
            "DELETE FROM BRM_RULE_APPROVALS WHERE RULE_ID = ?1 AND ACTION_TYPE = ?2",
            params![rule_id.as_i64(), action_type.as_str()],
        )
        .map_err(|err| db_err(&err))?;
        for row in rows {
            tx.execute(
                "INSERT INTO BRM_RULE_APPROVALS \
                 (RULE_ID, GROUP_NAME, USERNAME, APPROVED_FLAG, APPROVAL_STAGE, ACTION_TYPE, \
                 DECIDED_AT) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.rule_id.as_i64(),
                    row.group_name.as_str(),
                    row.username.as_str(),
                    row.approved_flag.as_i64(),
                    row.approval_stage,
                    row.action_type.as_str(),
                    row.decided_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(|err| db_err(&err))?;
        }
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn apply_approval(
        &self,
        rule: &Rule,
        row: &ApprovalRow,
        audit: &AuditEntry,
    ) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        let changed = tx
            .execute(
                "UPDATE BRM_RULE_APPROVALS SET APPROVED_FLAG = ?1, DECIDED_AT = ?2 \
                 WHERE RULE_ID = ?3 AND ACTION_TYPE = ?4 AND GROUP_NAME = ?5 AND USERNAME = ?6 \
                 AND APPROVAL_STAGE = ?7 AND APPROVED_FLAG = 0",
                params![
                    row.approved_flag.as_i64(),
                    row.decided_at.map(Timestamp::as_unix_millis),
                    row.rule_id.as_i64(),
                    row.action_type.as_str(),
                    row.group_name.as_str(),
                    row.username.as_str(),
                    row.approval_stage,
                ],
            )
            .map_err(|err| db_err(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!(
                "pending approval for {} on rule {}",
                row.username, row.rule_id
            )));
        }

        let columns = rule_params(rule);
        tx.execute(
            "UPDATE BRM_RULES SET RULE_NAME = ?1, SQL_TEXT = ?2, RULE_TYPE = ?3, \
             OWNER_GROUP = ?4, PARENT_RULE_ID = ?5, GROUP_ID = ?6, EFFECTIVE_START = ?7, \
             EFFECTIVE_END = ?8, OPERATION_KIND = ?9, IS_GLOBAL = ?10, CRITICAL_RULE = ?11, \
             CRITICAL_SCOPE = ?12, CDC_TYPE = ?13, STATUS = ?14, APPROVAL_STATUS = ?15, \
             LIFECYCLE_STATE = ?16, VERSION = ?17, CREATED_BY = ?18, CREATED_AT = ?19, \
             UPDATED_BY = ?20, UPDATED_AT = ?21, DECISION_TABLE_ID = ?22, LOGIC_EXPR = ?23 \
             WHERE RULE_ID = ?24",
            rusqlite::params_from_iter(
                columns
                    .iter()
                    .map(|column| &**column)
                    .chain(std::iter::once(&rule.rule_id.as_i64() as &dyn rusqlite::ToSql)),
            ),
        )
        .map_err(|err| db_err(&err))?;
        insert_audit(&tx, audit)?;

        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn try_acquire_lock(
        &self,
        lock: &RuleLock,
        now: Timestamp,
        force: bool,
    ) -> Result<LockAttempt, StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        // Lazily deactivate expired locks.
        tx.execute(
            "UPDATE BRM_RULE_LOCKS SET ACTIVE_LOCK = 0 \
             WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1 AND EXPIRY_TIMESTAMP < ?2",
            params![lock.rule_id.as_i64(), now.as_unix_millis()],
        )
        .map_err(|err| db_err(&err))?;

        if force {
            tx.execute(
                "UPDATE BRM_RULE_LOCKS SET ACTIVE_LOCK = 0 WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1",
                params![lock.rule_id.as_i64()],
            )
            .map_err(|err| db_err(&err))?;
        } else {
            let holder: Option<(String, i64)> = tx
                .query_row(
                    "SELECT LOCKED_BY, EXPIRY_TIMESTAMP FROM BRM_RULE_LOCKS \
                     WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1 LIMIT 1",
                    params![lock.rule_id.as_i64()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|err| db_err(&err))?;
            if let Some((owner, expires_at)) = holder {
                tx.commit().map_err(|err| db_err(&err))?;
                return Ok(LockAttempt::HeldBy {
                    owner: UserName::new(owner),
                    expires_at: Timestamp::from_unix_millis(expires_at),
                });
            }
        }

        tx.execute(
            "INSERT INTO BRM_RULE_LOCKS \
             (RULE_ID, LOCKED_BY, LOCK_TIMESTAMP, EXPIRY_TIMESTAMP, FORCE_LOCK, ACTIVE_LOCK) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                lock.rule_id.as_i64(),
                lock.locked_by.as_str(),
                lock.acquired_at.as_unix_millis(),
                lock.expires_at.as_unix_millis(),
                lock.force_lock,
            ],
        )
        .map_err(|err| db_err(&err))?;

        tx.commit().map_err(|err| db_err(&err))?;
        Ok(LockAttempt::Acquired(lock.clone()))
    }

    fn release_lock(&self, rule_id: RuleId) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "UPDATE BRM_RULE_LOCKS SET ACTIVE_LOCK = 0 WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1",
                params![rule_id.as_i64()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn active_lock(&self, rule_id: RuleId, now: Timestamp) -> Result<Option<RuleLock>, StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "UPDATE BRM_RULE_LOCKS SET ACTIVE_LOCK = 0 \
                 WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1 AND EXPIRY_TIMESTAMP < ?2",
                params![rule_id.as_i64(), now.as_unix_millis()],
            )
            .map_err(|err| db_err(&err))?;
        let row = guard
            .query_row(
                "SELECT RULE_ID, LOCKED_BY, LOCK_TIMESTAMP, EXPIRY_TIMESTAMP, FORCE_LOCK, \
                 ACTIVE_LOCK FROM BRM_RULE_LOCKS WHERE RULE_ID = ?1 AND ACTIVE_LOCK = 1 LIMIT 1",
                params![rule_id.as_i64()],
                |row| {
                    Ok(RuleLock {
                        rule_id: RuleId::new(row.get(0)?),
                        locked_by: UserName::new(row.get::<_, String>(1)?),
                        acquired_at: Timestamp::from_unix_millis(row.get(2)?),
                        expires_at: Timestamp::from_unix_millis(row.get(3)?),
                        force_lock: row.get(4)?,
                        active: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        Ok(row)
    }

    fn insert_schedule(
        &self,
        schedule: &Schedule,
        audit: &AuditEntry,
    ) -> Result<ScheduleId, StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        tx.execute(
            "INSERT INTO RULE_SCHEDULES \
             (RULE_ID, SCHEDULE_TIME, STATUS, RUN_DATA_VALIDATIONS, CREATED_AT) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                schedule.rule_id.as_i64(),
                schedule.fire_at.as_unix_millis(),
                schedule.status.as_str(),
                schedule.run_data_validations,
                schedule.created_at.as_unix_millis(),
            ],
        )
        .map_err(|err| db_err(&err))?;
        let assigned = ScheduleId::new(tx.last_insert_rowid());
        let mut entry = audit.clone();
        entry.record_id = assigned.as_i64();
        insert_audit(&tx, &entry)?;
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(assigned)
    }

    fn schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        let guard = self.guard()?;
        let row = guard
            .query_row(
                "SELECT SCHEDULE_ID, RULE_ID, SCHEDULE_TIME, STATUS, RUN_DATA_VALIDATIONS, \
                 CREATED_AT FROM RULE_SCHEDULES WHERE SCHEDULE_ID = ?1",
                params![schedule_id.as_i64()],
                read_raw_schedule,
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        row.map(raw_schedule_into).transpose()
    }

    fn due_schedules(&self, now: Timestamp) -> Result<Vec<Schedule>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT SCHEDULE_ID, RULE_ID, SCHEDULE_TIME, STATUS, RUN_DATA_VALIDATIONS, \
                 CREATED_AT FROM RULE_SCHEDULES \
                 WHERE STATUS = 'Scheduled' AND SCHEDULE_TIME <= ?1 \
                 ORDER BY SCHEDULE_TIME, SCHEDULE_ID",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![now.as_unix_millis()], read_raw_schedule)
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        rows.into_iter().map(raw_schedule_into).collect()
    }

    fn set_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        audit: Option<&AuditEntry>,
    ) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        let changed = tx
            .execute(
                "UPDATE RULE_SCHEDULES SET STATUS = ?1 WHERE SCHEDULE_ID = ?2",
                params![status.as_str(), schedule_id.as_i64()],
            )
            .map_err(|err| db_err(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("schedule {schedule_id}")));
        }
        if let Some(entry) = audit {
            insert_audit(&tx, entry)?;
        }
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn validations_for_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<DataValidation>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT VALIDATION_ID, TABLE_NAME, COLUMN_NAME, VALIDATION_TYPE, PARAMS \
                 FROM BRM_DATA_VALIDATIONS WHERE TABLE_NAME = ?1 ORDER BY VALIDATION_ID",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![table_name], |row| {
                Ok(DataValidation {
                    validation_id: ValidationId::new(row.get(0)?),
                    table_name: row.get(1)?,
                    column_name: row.get(2)?,
                    kind: ValidationKind::parse(&row.get::<_, String>(3)?),
                    params: row.get(4)?,
                })
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        Ok(rows)
    }

    fn insert_validation(
        &self,
        validation: &DataValidation,
    ) -> Result<ValidationId, StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO BRM_DATA_VALIDATIONS (TABLE_NAME, COLUMN_NAME, VALIDATION_TYPE, \
                 PARAMS) VALUES (?1, ?2, ?3, ?4)",
                params![
                    validation.table_name,
                    validation.column_name,
                    validation.kind.as_str(),
                    validation.params,
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(ValidationId::new(guard.last_insert_rowid()))
    }

    fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO RULE_EXECUTION_LOGS \
                 (RULE_ID, EXECUTION_TIMESTAMP, PASS_FLAG, MESSAGE, RECORD_COUNT, \
                 EXECUTION_TIME_MS) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.rule_id.as_i64(),
                    entry.fired_at.as_unix_millis(),
                    entry.pass_flag,
                    entry.message,
                    entry.record_count,
                    entry.elapsed_ms,
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn execution_logs(&self, rule_id: RuleId) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT RULE_ID, EXECUTION_TIMESTAMP, PASS_FLAG, MESSAGE, RECORD_COUNT, \
                 EXECUTION_TIME_MS FROM RULE_EXECUTION_LOGS WHERE RULE_ID = ?1 ORDER BY rowid",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![rule_id.as_i64()], |row| {
                Ok(ExecutionLogEntry {
                    rule_id: RuleId::new(row.get(0)?),
                    fired_at: Timestamp::from_unix_millis(row.get(1)?),
                    pass_flag: row.get(2)?,
                    message: row.get(3)?,
                    record_count: row.get(4)?,
                    elapsed_ms: row.get(5)?,
                })
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;
        Ok(rows)
    }

    fn append_validation_log(&self, entry: &ValidationLogEntry) -> Result<(), StoreError> {
        let guard = self.guard()?;
        guard
            .execute(
                "INSERT INTO BRM_VALIDATION_LOGS \
                 (VALIDATION_ID, TABLE_NAME, COLUMN_NAME, VALIDATION_TYPE, PARAMS, RESULT_FLAG, \
                 MESSAGE, VALIDATION_TIMESTAMP) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.validation_id.as_i64(),
                    entry.table_name,
                    entry.column_name,
                    entry.kind.as_str(),
                    entry.params,
                    entry.passed,
                    entry.message,
                    entry.at.as_unix_millis(),
                ],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let guard = self.guard()?;
        let mut statement = guard
            .prepare(
                "SELECT ACTION, TABLE_NAME, RECORD_ID, ACTION_BY, ACTION_GROUP, OLD_DATA, \
                 NEW_DATA, ACTION_TIMESTAMP FROM BRM_AUDIT_LOG ORDER BY rowid",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .map_err(|err| db_err(&err))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| db_err(&err))?;

        let mut entries = Vec::with_capacity(rows.len());
        for (action, table_name, record_id, by, group, old_data, new_data, at) in rows {
            let entry = AuditEntry {
                action: parse_enum(AuditAction::parse(&action), "ACTION", &action)?,
                table_name,
                record_id,
                actor: Actor::new(UserName::new(by), GroupName::new(group)),
                old_data: parse_snapshot(old_data.as_deref())?,
                new_data: parse_snapshot(new_data.as_deref())?,
                at: Timestamp::from_unix_millis(at),
            };
            if query.matches(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

// ============================================================================
// SECTION: Schedule Mapping
// ============================================================================

/// Raw schedule row before enum parsing.
type RawSchedule = (i64, i64, i64, String, bool, i64);

/// Reads one schedule row.
fn read_raw_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSchedule> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// Converts a raw schedule row into a typed schedule.
fn raw_schedule_into(raw: RawSchedule) -> Result<Schedule, StoreError> {
    let (schedule_id, rule_id, fire_at, status, run_data_validations, created_at) = raw;
    Ok(Schedule {
        schedule_id: ScheduleId::new(schedule_id),
        rule_id: RuleId::new(rule_id),
        fire_at: Timestamp::from_unix_millis(fire_at),
        status: parse_enum(ScheduleStatus::parse(&status), "STATUS", &status)?,
        run_data_validations,
        created_at: Timestamp::from_unix_millis(created_at),
    })
}

/// Parses a stored JSON snapshot column.
fn parse_snapshot(raw: Option<&str>) -> Result<Option<serde_json::Value>, StoreError> {
    raw.map(serde_json::from_str)
        .transpose()
        .map_err(|err| StoreError::ConstraintViolation(err.to_string()))
}
