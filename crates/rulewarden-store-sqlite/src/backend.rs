// crates/rulewarden-store-sqlite/src/backend.rs
// ============================================================================
// Module: SQLite Execution Backend
// Description: Transactional rule SQL execution and validation queries.
// Purpose: Probe rule SQL inside commit-on-pass transactions.
// Dependencies: crate::store, rulewarden-core, rusqlite
// ============================================================================

//! ## Overview
//! Rule SQL runs inside its own transaction: the first row of the result is
//! probed, the transaction commits when the probe passes, and rolls back
//! otherwise. Validation helpers run bounded read-only queries with quoted
//! identifiers; table and column names come from operator configuration, not
//! end users, but are still quoted defensively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rulewarden_core::ExecutionBackend;
use rulewarden_core::ExecutionBackendError;
use rulewarden_core::SqlProbe;
use rusqlite::params;

use crate::store::SqliteStore;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Quotes an identifier for interpolation into a statement.
fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Classifies a rusqlite error onto the backend taxonomy.
fn backend_err(err: &rusqlite::Error) -> ExecutionBackendError {
    let message = err.to_string();
    if message.contains("no such table") || message.contains("no such column") {
        ExecutionBackendError::MissingObject(message)
    } else {
        ExecutionBackendError::Sql(message)
    }
}

impl SqliteStore {
    /// Runs one scalar COUNT query.
    fn count_query(
        &self,
        sql: &str,
        query_params: &[&dyn rusqlite::ToSql],
    ) -> Result<i64, ExecutionBackendError> {
        let guard = self.guard().map_err(|err| {
            ExecutionBackendError::Unavailable(err.to_string())
        })?;
        guard
            .query_row(sql, rusqlite::params_from_iter(query_params.iter().copied()), |row| {
                row.get(0)
            })
            .map_err(|err| backend_err(&err))
    }
}

// ============================================================================
// SECTION: Execution Backend
// ============================================================================

impl ExecutionBackend for SqliteStore {
    fn execute_rule_sql(&self, sql: &str) -> Result<SqlProbe, ExecutionBackendError> {
        let mut guard = self
            .guard()
            .map_err(|err| ExecutionBackendError::Unavailable(err.to_string()))?;
        let tx = guard.transaction().map_err(|err| backend_err(&err))?;

        let probe = {
            let mut statement = tx.prepare(sql).map_err(|err| backend_err(&err))?;
            if statement.column_count() > 0 {
                let mut rows = statement.query(params![]).map_err(|err| backend_err(&err))?;
                let first = rows.next().map_err(|err| backend_err(&err))?;
                match first {
                    None => SqlProbe {
                        row_returned: false,
                        first_value: None,
                        record_count: 0,
                    },
                    Some(row) => {
                        let first_value = row.get::<_, i64>(0).ok();
                        let mut record_count: i64 = 1;
                        while rows.next().map_err(|err| backend_err(&err))?.is_some() {
                            record_count += 1;
                        }
                        SqlProbe {
                            row_returned: true,
                            first_value,
                            record_count,
                        }
                    }
                }
            } else {
                let affected = statement.execute(params![]).map_err(|err| backend_err(&err))?;
                SqlProbe {
                    row_returned: false,
                    first_value: None,
                    record_count: i64::try_from(affected).unwrap_or(i64::MAX),
                }
            }
        };

        if probe.passes() {
            tx.commit().map_err(|err| backend_err(&err))?;
        } else {
            tx.rollback().map_err(|err| backend_err(&err))?;
        }
        Ok(probe)
    }

    fn count_nulls(&self, table: &str, column: &str) -> Result<i64, ExecutionBackendError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            quote_ident(table),
            quote_ident(column)
        );
        self.count_query(&sql, &[])
    }

    fn count_outside_range(
        &self,
        table: &str,
        column: &str,
        min: f64,
        max: f64,
    ) -> Result<i64, ExecutionBackendError> {
        let column = quote_ident(column);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {column} IS NOT NULL AND ({column} < ?1 OR {column} > ?2)",
            quote_ident(table)
        );
        self.count_query(&sql, &[&min, &max])
    }

    fn sample_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>, ExecutionBackendError> {
        let column = quote_ident(column);
        let sql = format!(
            "SELECT CAST({column} AS TEXT) FROM {} WHERE {column} IS NOT NULL LIMIT ?1",
            quote_ident(table)
        );
        let guard = self
            .guard()
            .map_err(|err| ExecutionBackendError::Unavailable(err.to_string()))?;
        let mut statement = guard.prepare(&sql).map_err(|err| backend_err(&err))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let values = statement
            .query_map(params![limit], |row| row.get::<_, String>(0))
            .map_err(|err| backend_err(&err))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|err| backend_err(&err))?;
        Ok(values)
    }

    fn count_missing_references(
        &self,
        table: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
    ) -> Result<i64, ExecutionBackendError> {
        let column = quote_ident(column);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {column} IS NOT NULL AND {column} NOT IN \
             (SELECT {} FROM {})",
            quote_ident(table),
            quote_ident(ref_column),
            quote_ident(ref_table)
        );
        self.count_query(&sql, &[])
    }
}
