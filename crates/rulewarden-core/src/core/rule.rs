// crates/rulewarden-core/src/core/rule.rs
// ============================================================================
// Module: Rulewarden Rule Model
// Description: Rule rows, lifecycle enums, and dependency edge rows.
// Purpose: Define the versioned rule record and its relationship tables.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The rule is the unit of everything in Rulewarden: a named, versioned SQL
//! statement with ownership, lifecycle state, and approval state. This module
//! also defines the edge rows the dependency graph is assembled from:
//! hierarchy (via `parent_rule_id`), global-critical links, pairwise
//! conflicts, and composite logic expressions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GroupName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Lifecycle Enums
// ============================================================================

/// Rule execution status.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Rule is not eligible for execution.
    Inactive,
    /// Rule is approved and eligible for execution.
    Active,
    /// Deactivation is awaiting approval.
    DeactivateInProgress,
    /// Deletion is awaiting approval.
    DeleteInProgress,
}

impl RuleStatus {
    /// Returns the stable store form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::DeactivateInProgress => "DEACTIVATE_IN_PROGRESS",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
        }
    }

    /// Parses the stable store form of the status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INACTIVE" => Some(Self::Inactive),
            "ACTIVE" => Some(Self::Active),
            "DEACTIVATE_IN_PROGRESS" => Some(Self::DeactivateInProgress),
            "DELETE_IN_PROGRESS" => Some(Self::DeleteInProgress),
            _ => None,
        }
    }
}

/// Rule approval status.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// An approval pipeline is open with pending stages.
    ApprovalInProgress,
    /// The most recent pipeline completed with every stage approved.
    Approved,
    /// The most recent pipeline was rejected.
    Rejected,
    /// An admin activated the rule bypassing approval.
    ForceActivated,
    /// An admin deactivated the rule bypassing approval.
    ForceDeactivated,
    /// A deactivation pipeline is open.
    DeactivateInProgress,
    /// A deletion pipeline is open.
    DeleteInProgress,
}

impl ApprovalStatus {
    /// Returns the stable store form of the approval status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApprovalInProgress => "APPROVAL_IN_PROGRESS",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ForceActivated => "FORCE_ACTIVATED",
            Self::ForceDeactivated => "FORCE_DEACTIVATED",
            Self::DeactivateInProgress => "DEACTIVATE_IN_PROGRESS",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
        }
    }

    /// Parses the stable store form of the approval status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "APPROVAL_IN_PROGRESS" => Some(Self::ApprovalInProgress),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "FORCE_ACTIVATED" => Some(Self::ForceActivated),
            "FORCE_DEACTIVATED" => Some(Self::ForceDeactivated),
            "DEACTIVATE_IN_PROGRESS" => Some(Self::DeactivateInProgress),
            "DELETE_IN_PROGRESS" => Some(Self::DeleteInProgress),
            _ => None,
        }
    }
}

/// Advisory lifecycle state mirroring status and approval status.
///
/// # Invariants
/// - Informational only; never consulted for authorization or gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// A create-or-update pipeline is open.
    UnderApproval,
    /// The rule is active.
    Active,
    /// The rule is inactive.
    Inactive,
    /// A deactivation pipeline is open.
    DeactivatePending,
    /// A deletion pipeline is open.
    DeletePending,
}

impl LifecycleState {
    /// Returns the stable store form of the lifecycle state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnderApproval => "UNDER_APPROVAL",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::DeactivatePending => "DEACTIVATE_PENDING",
            Self::DeletePending => "DELETE_PENDING",
        }
    }

    /// Parses the stable store form of the lifecycle state.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNDER_APPROVAL" => Some(Self::UnderApproval),
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            "DEACTIVATE_PENDING" => Some(Self::DeactivatePending),
            "DELETE_PENDING" => Some(Self::DeletePending),
            _ => None,
        }
    }
}

/// Scope governing how far a critical failure propagates skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalScope {
    /// Failures never propagate.
    None,
    /// Failures propagate within the owning group's subtree.
    Group,
    /// Failures propagate within the rule's cluster.
    Cluster,
    /// Failures propagate to every descendant.
    Global,
}

impl CriticalScope {
    /// Returns the stable store form of the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Group => "GROUP",
            Self::Cluster => "CLUSTER",
            Self::Global => "GLOBAL",
        }
    }

    /// Parses the stable store form of the scope.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(Self::None),
            "GROUP" => Some(Self::Group),
            "CLUSTER" => Some(Self::Cluster),
            "GLOBAL" => Some(Self::Global),
            _ => None,
        }
    }
}

/// Operation kind derived from the rule's SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Leading SELECT statement.
    Select,
    /// Leading INSERT statement.
    Insert,
    /// Leading UPDATE statement.
    Update,
    /// Leading DELETE statement.
    Delete,
    /// Empty SQL with an associated decision table.
    DecisionTable,
    /// Any other leading keyword.
    Other,
}

impl OperationKind {
    /// Returns the stable store form of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::DecisionTable => "DECISION_TABLE",
            Self::Other => "OTHER",
        }
    }

    /// Parses the stable store form of the kind.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SELECT" => Some(Self::Select),
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "DECISION_TABLE" => Some(Self::DecisionTable),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }

    /// Returns whether the kind mutates its target tables.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }
}

/// Read or write usage of a dependency column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOp {
    /// Column is only read.
    Read,
    /// Column is a write target.
    Write,
}

impl ColumnOp {
    /// Returns the stable store form of the column operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
        }
    }

    /// Parses the stable store form of the column operation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "READ" => Some(Self::Read),
            "WRITE" => Some(Self::Write),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Rule Row
// ============================================================================

/// Versioned rule record.
///
/// # Invariants
/// - `(owner_group, name)` is unique across the store.
/// - `version` strictly increases on every mutation.
/// - `status`/`approval_status` only change through lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable numeric identifier.
    pub rule_id: RuleId,
    /// Rule name, unique within the owner group.
    pub name: String,
    /// SQL text executed for this rule; absent for decision-table rules.
    pub sql: Option<String>,
    /// Free-form rule-type tag.
    pub rule_type: String,
    /// Business group owning the rule.
    pub owner_group: GroupName,
    /// Optional parent rule forming the hierarchy edge.
    pub parent_rule_id: Option<RuleId>,
    /// Optional grouping identifier.
    pub group_id: Option<i64>,
    /// Optional effective-start timestamp.
    pub effective_start: Option<Timestamp>,
    /// Optional effective-end timestamp.
    pub effective_end: Option<Timestamp>,
    /// Operation kind derived from the SQL text.
    pub operation_kind: OperationKind,
    /// Whether the rule's lifecycle is restricted to admin actors.
    pub is_global: bool,
    /// Whether execution failures propagate skips to descendants.
    pub critical_rule: bool,
    /// Scope of critical failure propagation.
    pub critical_scope: CriticalScope,
    /// Informational change-data-capture tag.
    pub cdc_type: Option<String>,
    /// Execution status.
    pub status: RuleStatus,
    /// Approval status.
    pub approval_status: ApprovalStatus,
    /// Advisory lifecycle state mirror.
    pub lifecycle_state: LifecycleState,
    /// Monotonic version, starting at 1.
    pub version: i64,
    /// User that created the rule.
    pub created_by: UserName,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// User that last mutated the rule.
    pub updated_by: UserName,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
    /// Optional decision-table reference.
    pub decision_table_id: Option<i64>,
    /// Composite logic expression referencing other rules by `Rule<digits>`
    /// tokens; absent for plain rules.
    pub logic_expr: Option<String>,
}

// ============================================================================
// SECTION: Rule Draft
// ============================================================================

/// Caller-supplied fields for creating or updating a rule.
///
/// The engine fills identity, versioning, state, and audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    /// Rule name, unique within the owner group.
    pub name: String,
    /// SQL text; absent for decision-table rules.
    pub sql: Option<String>,
    /// Free-form rule-type tag.
    pub rule_type: String,
    /// Business group owning the rule.
    pub owner_group: GroupName,
    /// Optional parent rule.
    pub parent_rule_id: Option<RuleId>,
    /// Optional grouping identifier.
    pub group_id: Option<i64>,
    /// Optional effective-start timestamp.
    pub effective_start: Option<Timestamp>,
    /// Optional effective-end timestamp.
    pub effective_end: Option<Timestamp>,
    /// Whether the rule's lifecycle is restricted to admin actors.
    pub is_global: bool,
    /// Whether execution failures propagate skips to descendants.
    pub critical_rule: bool,
    /// Scope of critical failure propagation.
    pub critical_scope: CriticalScope,
    /// Informational change-data-capture tag.
    pub cdc_type: Option<String>,
    /// Optional decision-table reference.
    pub decision_table_id: Option<i64>,
    /// Composite logic expression, when the rule is a composite.
    pub logic_expr: Option<String>,
}

impl RuleDraft {
    /// Creates a minimal draft with the given name, group, and SQL text.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        owner_group: impl Into<GroupName>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sql: Some(sql.into()),
            rule_type: "standard".to_string(),
            owner_group: owner_group.into(),
            parent_rule_id: None,
            group_id: None,
            effective_start: None,
            effective_end: None,
            is_global: false,
            critical_rule: false,
            critical_scope: CriticalScope::None,
            cdc_type: None,
            decision_table_id: None,
            logic_expr: None,
        }
    }
}

// ============================================================================
// SECTION: Dependency Rows
// ============================================================================

/// Table/column dependency row recorded from SQL analysis.
///
/// # Invariants
/// - Rows are replaced wholesale whenever the rule's SQL is re-analyzed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableDependency {
    /// Rule owning the dependency.
    pub rule_id: RuleId,
    /// Database the table lives in, when qualified.
    pub database_name: Option<String>,
    /// Schema-qualified table name.
    pub table_name: String,
    /// Referenced column, when column-level detail is known.
    pub column_name: Option<String>,
    /// Read or write usage.
    pub column_op: ColumnOp,
}

/// Global-critical link row: a many-to-many gating edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCriticalLink {
    /// Gating global-critical rule.
    pub gcr_rule_id: RuleId,
    /// Rule gated by the link.
    pub target_rule_id: RuleId,
}

/// Pairwise conflict row with per-side priorities.
///
/// # Invariants
/// - The higher-priority side gates the other; equal priorities gate
///   deterministically from `rule_id1` to `rule_id2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConflict {
    /// First rule of the pair.
    pub rule_id1: RuleId,
    /// Second rule of the pair.
    pub rule_id2: RuleId,
    /// Priority of the first rule.
    pub priority1: i64,
    /// Priority of the second rule.
    pub priority2: i64,
}

impl RuleConflict {
    /// Returns the executor edge for this conflict as (parent, child).
    #[must_use]
    pub const fn edge(&self) -> (RuleId, RuleId) {
        if self.priority2 > self.priority1 {
            (self.rule_id2, self.rule_id1)
        } else {
            (self.rule_id1, self.rule_id2)
        }
    }
}

/// Column mapping row linking a rule's output column to another rule.
///
/// The mapping store may be absent at runtime; consumers must degrade to
/// hierarchy-only traversal when no rows exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Source rule of the mapping.
    pub rule_id: RuleId,
    /// Rule consuming the mapped column.
    pub mapped_rule_id: RuleId,
    /// Mapped column name.
    pub column_name: String,
}
