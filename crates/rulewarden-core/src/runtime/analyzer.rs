// crates/rulewarden-core/src/runtime/analyzer.rs
// ============================================================================
// Module: Rulewarden Regex SQL Analyzer
// Description: Conservative regex implementation of the SQL analyzer contract.
// Purpose: Derive operation kind, tables, and write columns from rule SQL.
// Dependencies: crate::{core, interfaces}, regex
// ============================================================================

//! ## Overview
//! The default analyzer favors false positives over false negatives: every
//! table the SQL actually references must appear in the result, and extra
//! matches only cost validation work. Hosts needing dialect-precise analysis
//! plug their own [`SqlAnalyzer`] implementation in at engine construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use regex::Regex;

use crate::core::rule::ColumnOp;
use crate::core::rule::OperationKind;
use crate::interfaces::AnalyzerError;
use crate::interfaces::ColumnUse;
use crate::interfaces::SqlAnalysis;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::TableRef;

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// Regex-driven [`SqlAnalyzer`] implementation.
#[derive(Debug, Clone)]
pub struct RegexSqlAnalyzer {
    /// Matches table names after FROM, JOIN, INTO, or UPDATE keywords.
    table_pattern: Regex,
    /// Matches the column list of an INSERT statement.
    insert_columns_pattern: Regex,
    /// Matches assignment targets in an UPDATE SET clause.
    set_column_pattern: Regex,
}

impl RegexSqlAnalyzer {
    /// Creates the analyzer, compiling its patterns.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when a pattern fails to compile.
    pub fn new() -> Result<Self, AnalyzerError> {
        let table_pattern = compile(r"(?i)\b(?:from|join|into|update)\s+([A-Za-z0-9_\.\[\]]+)")?;
        let insert_columns_pattern = compile(r"(?i)\binsert\s+into\s+[A-Za-z0-9_\.\[\]]+\s*\(([^)]*)\)")?;
        let set_column_pattern = compile(r"(?i)(?:\bset\s+|,\s*)([A-Za-z0-9_\[\]]+)\s*=")?;
        Ok(Self {
            table_pattern,
            insert_columns_pattern,
            set_column_pattern,
        })
    }
}

/// Compiles one analyzer pattern.
fn compile(pattern: &str) -> Result<Regex, AnalyzerError> {
    Regex::new(pattern).map_err(|err| AnalyzerError::Analysis(err.to_string()))
}

impl SqlAnalyzer for RegexSqlAnalyzer {
    fn analyze(
        &self,
        sql: Option<&str>,
        has_decision_table: bool,
    ) -> Result<SqlAnalysis, AnalyzerError> {
        let trimmed = sql.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            let operation_kind = if has_decision_table {
                OperationKind::DecisionTable
            } else {
                OperationKind::Other
            };
            return Ok(SqlAnalysis {
                operation_kind,
                tables: Vec::new(),
                columns: Vec::new(),
            });
        }

        let operation_kind = leading_keyword_kind(trimmed);
        let tables = self.scan_tables(trimmed);
        let columns = self.scan_write_columns(trimmed, operation_kind);
        Ok(SqlAnalysis {
            operation_kind,
            tables,
            columns,
        })
    }
}

impl RegexSqlAnalyzer {
    /// Collects the distinct table references in statement order.
    fn scan_tables(&self, sql: &str) -> Vec<TableRef> {
        let mut seen = BTreeSet::new();
        let mut tables = Vec::new();
        for capture in self.table_pattern.captures_iter(sql) {
            let Some(raw) = capture.get(1) else {
                continue;
            };
            let table = parse_table_ref(raw.as_str());
            if table.table.is_empty() {
                continue;
            }
            if seen.insert(table.clone()) {
                tables.push(table);
            }
        }
        tables
    }

    /// Collects write-target columns for mutating statements.
    fn scan_write_columns(&self, sql: &str, kind: OperationKind) -> Vec<ColumnUse> {
        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();
        match kind {
            OperationKind::Insert => {
                if let Some(capture) = self.insert_columns_pattern.captures(sql)
                    && let Some(list) = capture.get(1)
                {
                    for raw in list.as_str().split(',') {
                        push_column(&mut seen, &mut columns, raw, ColumnOp::Write);
                    }
                }
            }
            OperationKind::Update => {
                for capture in self.set_column_pattern.captures_iter(sql) {
                    if let Some(raw) = capture.get(1) {
                        push_column(&mut seen, &mut columns, raw.as_str(), ColumnOp::Write);
                    }
                }
            }
            OperationKind::Select
            | OperationKind::Delete
            | OperationKind::DecisionTable
            | OperationKind::Other => {}
        }
        columns
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Derives the operation kind from the statement's leading keyword.
fn leading_keyword_kind(sql: &str) -> OperationKind {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" => OperationKind::Select,
        "INSERT" => OperationKind::Insert,
        "UPDATE" => OperationKind::Update,
        "DELETE" => OperationKind::Delete,
        _ => OperationKind::Other,
    }
}

/// Parses a possibly bracketed, possibly qualified table token.
fn parse_table_ref(raw: &str) -> TableRef {
    let parts: Vec<String> = raw
        .split('.')
        .map(unbracket)
        .filter(|part| !part.is_empty())
        .collect();
    match parts.as_slice() {
        [database, schema, table] => TableRef {
            database: Some(database.clone()),
            schema: Some(schema.clone()),
            table: table.clone(),
        },
        [schema, table] => TableRef {
            database: None,
            schema: Some(schema.clone()),
            table: table.clone(),
        },
        [table] => TableRef {
            database: None,
            schema: None,
            table: table.clone(),
        },
        _ => TableRef {
            database: None,
            schema: None,
            table: String::new(),
        },
    }
}

/// Strips surrounding square brackets from an identifier.
fn unbracket(identifier: &str) -> String {
    identifier
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}

/// Deduplicates and records one column usage.
fn push_column(
    seen: &mut BTreeSet<String>,
    columns: &mut Vec<ColumnUse>,
    raw: &str,
    usage: ColumnOp,
) {
    let column = unbracket(raw);
    if column.is_empty() {
        return;
    }
    if seen.insert(column.clone()) {
        columns.push(ColumnUse {
            column,
            usage,
        });
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn select_kind_and_tables() {
        let analyzer = RegexSqlAnalyzer::new().unwrap();
        let analysis = analyzer
            .analyze(Some("SELECT 1 FROM dbo.Orders o JOIN [Customers] c ON 1=1"), false)
            .unwrap();
        assert_eq!(analysis.operation_kind, OperationKind::Select);
        let names: Vec<String> = analysis.tables.iter().map(TableRef::qualified_name).collect();
        assert_eq!(names, vec!["dbo.Orders".to_string(), "Customers".to_string()]);
    }

    #[test]
    fn empty_sql_with_decision_table() {
        let analyzer = RegexSqlAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(None, true).unwrap();
        assert_eq!(analysis.operation_kind, OperationKind::DecisionTable);
        assert!(analysis.tables.is_empty());
    }

    #[test]
    fn insert_write_columns() {
        let analyzer = RegexSqlAnalyzer::new().unwrap();
        let analysis = analyzer
            .analyze(Some("INSERT INTO audit_rows (id, actor, at) VALUES (1, 'a', 2)"), false)
            .unwrap();
        assert_eq!(analysis.operation_kind, OperationKind::Insert);
        let writes: Vec<&str> = analysis.columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(writes, vec!["id", "actor", "at"]);
        assert!(analysis.columns.iter().all(|c| c.usage == ColumnOp::Write));
    }

    #[test]
    fn update_set_columns() {
        let analyzer = RegexSqlAnalyzer::new().unwrap();
        let analysis = analyzer
            .analyze(Some("UPDATE inventory SET qty = qty - 1, touched = 1 WHERE id = 9"), false)
            .unwrap();
        assert_eq!(analysis.operation_kind, OperationKind::Update);
        let writes: Vec<&str> = analysis.columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(writes, vec!["qty", "touched"]);
        assert_eq!(analysis.tables[0].table, "inventory");
    }

    #[test]
    fn unknown_leading_keyword_is_other() {
        let analyzer = RegexSqlAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(Some("MERGE target USING src ON 1=1"), false).unwrap();
        assert_eq!(analysis.operation_kind, OperationKind::Other);
    }
}
