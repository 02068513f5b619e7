// crates/rulewarden-core/tests/graph_unit.rs
// ============================================================================
// Module: Dependency Graph Unit Tests
// Description: Edge assembly from hierarchy, links, conflicts, composites.
// Purpose: Validate adjacency construction, roots, and descendant traversal.
// ============================================================================

//! Graph builder tests over the four edge sources.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::admin;
use common::draft;
use common::harness;
use common::ts;
use rulewarden_core::DependencyGraph;
use rulewarden_core::GlobalCriticalLink;
use rulewarden_core::RuleConflict;
use rulewarden_core::RuleId;
use rulewarden_core::Store;

#[test]
fn hierarchy_contributes_parent_to_child_edges() {
    let h = harness();
    let parent = h.engine.create_rule(&draft("P", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut child_draft = draft("C", "SELECT 1");
    child_draft.parent_rule_id = Some(parent.rule_id);
    let child = h.engine.create_rule(&child_draft, &admin(), ts(1_001)).unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    assert_eq!(graph.children(parent.rule_id), vec![child.rule_id]);
    assert_eq!(graph.roots(), vec![parent.rule_id]);
}

#[test]
fn global_critical_links_contribute_edges() {
    let h = harness();
    let gate = h.engine.create_rule(&draft("GATE", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let target = h.engine.create_rule(&draft("TARGET", "SELECT 1"), &admin(), ts(1_001)).unwrap();
    h.store
        .insert_global_critical_link(&GlobalCriticalLink {
            gcr_rule_id: gate.rule_id,
            target_rule_id: target.rule_id,
        })
        .unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    assert_eq!(graph.children(gate.rule_id), vec![target.rule_id]);
}

#[test]
fn higher_priority_conflict_side_gates_the_other() {
    let h = harness();
    let low = h.engine.create_rule(&draft("LOW", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let high = h.engine.create_rule(&draft("HIGH", "SELECT 1"), &admin(), ts(1_001)).unwrap();
    h.store
        .insert_conflict(&RuleConflict {
            rule_id1: low.rule_id,
            rule_id2: high.rule_id,
            priority1: 1,
            priority2: 5,
        })
        .unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    assert_eq!(graph.children(high.rule_id), vec![low.rule_id]);
    assert!(graph.children(low.rule_id).is_empty());
}

#[test]
fn equal_priority_conflicts_gate_from_rule_id1() {
    let h = harness();
    let first = h.engine.create_rule(&draft("FIRST", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let second = h.engine.create_rule(&draft("SECOND", "SELECT 1"), &admin(), ts(1_001)).unwrap();
    h.store
        .insert_conflict(&RuleConflict {
            rule_id1: first.rule_id,
            rule_id2: second.rule_id,
            priority1: 3,
            priority2: 3,
        })
        .unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    assert_eq!(graph.children(first.rule_id), vec![second.rule_id]);
}

#[test]
fn composite_tokens_name_the_composites_parents() {
    let h = harness();
    let base_a = h.engine.create_rule(&draft("A", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let base_b = h.engine.create_rule(&draft("B", "SELECT 1"), &admin(), ts(1_001)).unwrap();
    let mut composite_draft = draft("COMPOSITE", "SELECT 1");
    composite_draft.logic_expr =
        Some(format!("Rule{} AND NOT Rule{}", base_a.rule_id, base_b.rule_id));
    let composite = h.engine.create_rule(&composite_draft, &admin(), ts(1_002)).unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    assert_eq!(graph.children(base_a.rule_id), vec![composite.rule_id]);
    assert_eq!(graph.children(base_b.rule_id), vec![composite.rule_id]);
}

#[test]
fn malformed_tokens_are_ignored() {
    let h = harness();
    let mut composite_draft = draft("COMPOSITE", "SELECT 1");
    composite_draft.logic_expr = Some("RuleX AND rule7 AND Rule 8".to_string());
    let composite = h.engine.create_rule(&composite_draft, &admin(), ts(1_000)).unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    // No token matched the exact Rule<digits> shape.
    assert_eq!(graph.roots(), vec![composite.rule_id]);
}

#[test]
fn descendants_follow_every_edge_kind_and_tolerate_cycles() {
    let h = harness();
    let a = h.engine.create_rule(&draft("A", "SELECT 1"), &admin(), ts(1_000)).unwrap();
    let mut b_draft = draft("B", "SELECT 1");
    b_draft.parent_rule_id = Some(a.rule_id);
    let b = h.engine.create_rule(&b_draft, &admin(), ts(1_001)).unwrap();
    let c = h.engine.create_rule(&draft("C", "SELECT 1"), &admin(), ts(1_002)).unwrap();
    h.store
        .insert_global_critical_link(&GlobalCriticalLink {
            gcr_rule_id: b.rule_id,
            target_rule_id: c.rule_id,
        })
        .unwrap();
    // Close the loop C -> A.
    h.store
        .insert_conflict(&RuleConflict {
            rule_id1: c.rule_id,
            rule_id2: a.rule_id,
            priority1: 9,
            priority2: 1,
        })
        .unwrap();

    let graph = DependencyGraph::build(&h.store).unwrap();
    let descendants: Vec<RuleId> = graph.descendants(a.rule_id).into_iter().collect();
    // The cycle edge back into A is tolerated and A itself stays excluded.
    assert_eq!(descendants, vec![b.rule_id, c.rule_id]);
}
