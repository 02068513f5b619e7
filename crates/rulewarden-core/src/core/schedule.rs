// crates/rulewarden-core/src/core/schedule.rs
// ============================================================================
// Module: Rulewarden Schedule Model
// Description: Wall-clock execution schedule row.
// Purpose: Define the record the scheduler scans and advances.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A schedule fires a rule execution at a wall-clock time. Each schedule
//! advances exactly once per firing: Scheduled rows become Executed or
//! Failed, and Cancelled rows are never selected by the due-scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScheduleId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Schedule Status
// ============================================================================

/// Schedule lifecycle status.
///
/// # Invariants
/// - Only `Scheduled` rows are eligible for the due-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Awaiting its fire time.
    Scheduled,
    /// Fired and the executor returned.
    Executed,
    /// Fired but execution raised at top level.
    Failed,
    /// Cancelled before firing.
    Cancelled,
}

impl ScheduleStatus {
    /// Returns the stable store form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Executed => "Executed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Parses the stable store form of the status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Scheduled" => Some(Self::Scheduled),
            "Executed" => Some(Self::Executed),
            "Failed" => Some(Self::Failed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Schedule Row
// ============================================================================

/// Wall-clock execution schedule for a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule identifier.
    pub schedule_id: ScheduleId,
    /// Rule to execute.
    pub rule_id: RuleId,
    /// Fire-at timestamp.
    pub fire_at: Timestamp,
    /// Lifecycle status.
    pub status: ScheduleStatus,
    /// Whether the firing runs data validations before execution.
    pub run_data_validations: bool,
    /// Creation timestamp.
    pub created_at: Timestamp,
}
