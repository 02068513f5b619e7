// crates/rulewarden-core/src/core/mod.rs
// ============================================================================
// Module: Rulewarden Core Types
// Description: Data model shared by every Rulewarden component.
// Purpose: Group the typed rows, status enums, and error taxonomy.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! Plain value types for every persisted entity: rules, approvals, locks,
//! schedules, audit entries, execution and validation logs. The store owns
//! the persisted rows; everything else passes these values around.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod actor;
pub mod audit;
pub mod approval;
pub mod error;
pub mod execution;
pub mod identifiers;
pub mod lock;
pub mod rule;
pub mod schedule;
pub mod time;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use actor::Actor;
pub use approval::ActionType;
pub use approval::ApprovalRoster;
pub use approval::ApprovalRow;
pub use approval::ApprovedFlag;
pub use approval::FINAL_STAGE_GROUP;
pub use audit::AuditAction;
pub use audit::AuditEntry;
pub use audit::AuditQuery;
pub use error::EngineError;
pub use execution::ExecutionLogEntry;
pub use execution::ExecutionReport;
pub use execution::ValidationLogEntry;
pub use identifiers::GroupName;
pub use identifiers::RuleId;
pub use identifiers::ScheduleId;
pub use identifiers::UserName;
pub use identifiers::ValidationId;
pub use lock::RuleLock;
pub use rule::ColumnMapping;
pub use rule::ColumnOp;
pub use rule::CriticalScope;
pub use rule::GlobalCriticalLink;
pub use rule::LifecycleState;
pub use rule::OperationKind;
pub use rule::Rule;
pub use rule::RuleConflict;
pub use rule::RuleDraft;
pub use rule::RuleStatus;
pub use rule::ApprovalStatus;
pub use rule::TableDependency;
pub use schedule::Schedule;
pub use schedule::ScheduleStatus;
pub use time::Timestamp;
pub use validation::DataValidation;
pub use validation::ValidationKind;
