// crates/rulewarden-core/src/core/actor.rs
// ============================================================================
// Module: Rulewarden Actor Identity
// Description: Caller identity supplied on every mutating operation.
// Purpose: Carry the (user, group) pair used for authorization decisions.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Rulewarden never authenticates; callers supply an [`Actor`] on every
//! mutation and the engine authorizes against it. Admin membership is decided
//! by comparing the actor's group to the configured admin group name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GroupName;
use crate::core::identifiers::UserName;

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Identity performing an operation.
///
/// # Invariants
/// - Supplied by the host on every mutation; never derived by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User performing the operation.
    pub user: UserName,
    /// Business group the user acts for.
    pub group: GroupName,
}

impl Actor {
    /// Creates a new actor identity.
    #[must_use]
    pub fn new(user: impl Into<UserName>, group: impl Into<GroupName>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }

    /// Returns whether the actor belongs to the given admin group.
    #[must_use]
    pub fn is_admin(&self, admin_group: &GroupName) -> bool {
        self.group == *admin_group
    }
}
