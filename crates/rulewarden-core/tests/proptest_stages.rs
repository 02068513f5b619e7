// crates/rulewarden-core/tests/proptest_stages.rs
// ============================================================================
// Module: Stage Layout Property Tests
// Description: Pipeline stage arithmetic under arbitrary impacted sets.
// Purpose: Validate contiguity, terminal placement, and conflict tie-breaks.
// ============================================================================

//! Property tests over the pure pipeline and conflict-edge functions.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use proptest::prelude::*;
use rulewarden_core::ActionType;
use rulewarden_core::ApprovalRoster;
use rulewarden_core::GroupName;
use rulewarden_core::RuleConflict;
use rulewarden_core::RuleId;
use rulewarden_core::UserName;

/// Roster over BG1..BG3 with one approver each.
fn roster() -> ApprovalRoster {
    let mut approvers = BTreeMap::new();
    for (group, user) in [("BG1", "alice"), ("BG2", "bob"), ("BG3", "carol")] {
        approvers.insert(GroupName::new(group), vec![UserName::new(user)]);
    }
    ApprovalRoster {
        stage_order: vec![GroupName::new("BG1"), GroupName::new("BG2"), GroupName::new("BG3")],
        approvers,
        final_approver: UserName::new("chief"),
    }
}

proptest! {
    #[test]
    fn stages_are_contiguous_from_one_and_end_terminal(mask in 0u8..8) {
        let mut impacted = BTreeSet::new();
        for (bit, group) in ["BG1", "BG2", "BG3"].iter().enumerate() {
            if mask & (1 << bit) != 0 {
                impacted.insert(GroupName::new(*group));
            }
        }

        let rows = roster().stage_rows(RuleId::new(1), &impacted, ActionType::CreateOrUpdate);
        prop_assert!(!rows.is_empty());

        let stages: BTreeSet<u32> = rows.iter().map(|row| row.approval_stage).collect();
        let max_stage = *stages.iter().max().unwrap();
        // Contiguous 1..=k.
        prop_assert_eq!(u32::try_from(stages.len()).unwrap(), max_stage);
        prop_assert!(stages.contains(&1));
        // Terminal stage is always last and always present exactly once.
        let terminal: Vec<_> =
            rows.iter().filter(|row| row.group_name.as_str() == "FINAL").collect();
        prop_assert_eq!(terminal.len(), 1);
        prop_assert_eq!(terminal[0].approval_stage, max_stage);
        // Action type is constant across the pipeline.
        prop_assert!(rows.iter().all(|row| row.action_type == ActionType::CreateOrUpdate));
    }

    #[test]
    fn conflict_edges_are_deterministic(id1 in 1i64..100, id2 in 1i64..100, p1 in 0i64..10, p2 in 0i64..10) {
        let conflict = RuleConflict {
            rule_id1: RuleId::new(id1),
            rule_id2: RuleId::new(id2),
            priority1: p1,
            priority2: p2,
        };
        let (parent, child) = conflict.edge();
        if p2 > p1 {
            prop_assert_eq!(parent, RuleId::new(id2));
            prop_assert_eq!(child, RuleId::new(id1));
        } else {
            // Ties gate from rule_id1.
            prop_assert_eq!(parent, RuleId::new(id1));
            prop_assert_eq!(child, RuleId::new(id2));
        }
    }
}
