// crates/rulewarden-core/src/runtime/graph.rs
// ============================================================================
// Module: Rulewarden Dependency Graph Builder
// Description: Assembles the execution DAG from the four edge sources.
// Purpose: Give the executor a cycle-tolerant parent-to-child adjacency map.
// Dependencies: crate::{core, interfaces}, regex
// ============================================================================

//! ## Overview
//! Edges point parent-to-child: hierarchy via `parent_rule_id`,
//! global-critical links, conflict pairs (the higher-priority rule gates the
//! other, `rule_id1` winning ties), and composite logic expressions whose
//! `Rule<digits>` tokens name the composite's parents. The builder is pure
//! and read-only; cycles are tolerated here and broken by the executor's
//! visited set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;

use crate::core::error::EngineError;
use crate::core::identifiers::RuleId;
use crate::interfaces::Store;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token pattern naming referenced rules inside composite logic expressions.
const COMPOSITE_TOKEN_PATTERN: &str = r"Rule(\d+)";

// ============================================================================
// SECTION: Dependency Graph
// ============================================================================

/// Parent-to-child adjacency map over rule identifiers.
///
/// # Invariants
/// - Every node referenced by an edge has an entry, possibly empty.
/// - Iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Outbound edges per rule.
    edges: BTreeMap<RuleId, BTreeSet<RuleId>>,
}

impl DependencyGraph {
    /// Builds the graph from the store's current rows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a store read fails.
    pub fn build<S: Store>(store: &S) -> Result<Self, EngineError> {
        let token_pattern = Regex::new(COMPOSITE_TOKEN_PATTERN)
            .map_err(|err| EngineError::Backend(err.to_string()))?;
        let mut graph = Self::default();

        let rules = store.rules()?;
        for rule in &rules {
            graph.touch(rule.rule_id);
            if let Some(parent) = rule.parent_rule_id {
                graph.add_edge(parent, rule.rule_id);
            }
            if let Some(expr) = &rule.logic_expr {
                for capture in token_pattern.captures_iter(expr) {
                    let Some(digits) = capture.get(1) else {
                        continue;
                    };
                    let Ok(referenced) = digits.as_str().parse::<i64>() else {
                        continue;
                    };
                    graph.add_edge(RuleId::new(referenced), rule.rule_id);
                }
            }
        }

        for link in store.global_critical_links()? {
            graph.add_edge(link.gcr_rule_id, link.target_rule_id);
        }

        for conflict in store.conflicts()? {
            let (parent, child) = conflict.edge();
            graph.add_edge(parent, child);
        }

        Ok(graph)
    }

    /// Ensures a node exists in the map.
    fn touch(&mut self, rule_id: RuleId) {
        self.edges.entry(rule_id).or_default();
    }

    /// Adds a parent-to-child edge, creating both nodes.
    pub fn add_edge(&mut self, parent: RuleId, child: RuleId) {
        self.edges.entry(parent).or_default().insert(child);
        self.touch(child);
    }

    /// Returns the outbound neighbors of a rule.
    #[must_use]
    pub fn children(&self, rule_id: RuleId) -> Vec<RuleId> {
        self.edges
            .get(&rule_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the rules with no inbound edges, in identifier order.
    #[must_use]
    pub fn roots(&self) -> Vec<RuleId> {
        let mut has_inbound = BTreeSet::new();
        for children in self.edges.values() {
            has_inbound.extend(children.iter().copied());
        }
        self.edges.keys().copied().filter(|id| !has_inbound.contains(id)).collect()
    }

    /// Returns every rule reachable from the given rule, depth first,
    /// excluding the rule itself. Cycles are tolerated.
    #[must_use]
    pub fn descendants(&self, rule_id: RuleId) -> BTreeSet<RuleId> {
        let mut reached = BTreeSet::new();
        let mut stack: Vec<RuleId> = self.children(rule_id);
        while let Some(next) = stack.pop() {
            if next == rule_id || !reached.insert(next) {
                continue;
            }
            stack.extend(self.children(next));
        }
        reached
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
