// crates/rulewarden-core/src/core/validation.rs
// ============================================================================
// Module: Rulewarden Data Validation Model
// Description: Configured column-level checks against the backing database.
// Purpose: Define the validation row the runner evaluates before execution.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Data validations are configured per (table, column) and gate rule
//! execution when enabled. Kinds unknown to this build are preserved as
//! [`ValidationKind::Unknown`] and fail explicitly at run time rather than
//! being silently dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ValidationId;

// ============================================================================
// SECTION: Validation Kind
// ============================================================================

/// Kind of column-level check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// No row may hold a NULL in the column.
    NotNull,
    /// Every value must fall within `"min,max"` parameters.
    Range,
    /// Every sampled non-null value must match the parameter pattern.
    Regex,
    /// Every value must reference a row in `"ref_table,ref_column"`.
    ForeignKey,
    /// Kind not understood by this build; always fails at run time.
    Unknown(String),
}

impl ValidationKind {
    /// Returns the stable store form of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotNull => "NOT NULL",
            Self::Range => "RANGE",
            Self::Regex => "REGEX",
            Self::ForeignKey => "FOREIGN_KEY",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Parses the stable store form of the kind, preserving unknown values.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "NOT NULL" => Self::NotNull,
            "RANGE" => Self::Range,
            "REGEX" => Self::Regex,
            "FOREIGN_KEY" => Self::ForeignKey,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Validation Row
// ============================================================================

/// Configured column-level check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidation {
    /// Validation identifier.
    pub validation_id: ValidationId,
    /// Validated table.
    pub table_name: String,
    /// Validated column.
    pub column_name: String,
    /// Check kind.
    pub kind: ValidationKind,
    /// Kind-specific parameter string.
    pub params: Option<String>,
}
