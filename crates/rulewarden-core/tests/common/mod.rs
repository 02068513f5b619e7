// crates/rulewarden-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Fixtures
// Description: Shared engine construction helpers for core tests.
// Purpose: Build an engine over the in-memory store and scripted backend.
// ============================================================================

//! Shared fixtures for rulewarden-core integration tests.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers are permitted and not every test uses every helper."
)]

use std::collections::BTreeMap;

use rulewarden_core::Actor;
use rulewarden_core::ApprovalRoster;
use rulewarden_core::ChannelNotifier;
use rulewarden_core::Engine;
use rulewarden_core::EngineSettings;
use rulewarden_core::GroupName;
use rulewarden_core::InMemoryStore;
use rulewarden_core::RegexSqlAnalyzer;
use rulewarden_core::RuleDraft;
use rulewarden_core::ScriptedBackend;
use rulewarden_core::Timestamp;
use rulewarden_core::UserName;

/// Engine type used across the core test suite.
pub type TestEngine = Engine<InMemoryStore, ScriptedBackend, RegexSqlAnalyzer, ChannelNotifier>;

/// Handles onto the engine's shared collaborators.
pub struct TestHarness {
    pub engine: TestEngine,
    pub store: InMemoryStore,
    pub backend: ScriptedBackend,
    pub notifier: ChannelNotifier,
}

/// Builds the standard three-group roster: alice/BG1, bob/BG2, carol/BG3,
/// with chief as the final approver.
pub fn roster() -> ApprovalRoster {
    let mut approvers = BTreeMap::new();
    approvers.insert(GroupName::new("BG1"), vec![UserName::new("alice")]);
    approvers.insert(GroupName::new("BG2"), vec![UserName::new("bob")]);
    approvers.insert(GroupName::new("BG3"), vec![UserName::new("carol")]);
    ApprovalRoster {
        stage_order: vec![GroupName::new("BG1"), GroupName::new("BG2"), GroupName::new("BG3")],
        approvers,
        final_approver: UserName::new("chief"),
    }
}

/// Builds an engine over fresh in-memory collaborators.
pub fn harness() -> TestHarness {
    let store = InMemoryStore::new();
    let backend = ScriptedBackend::passing();
    let notifier = ChannelNotifier::new();
    let engine = Engine::new(
        store.clone(),
        backend.clone(),
        RegexSqlAnalyzer::new().unwrap(),
        notifier.clone(),
        EngineSettings::default(),
        roster(),
    )
    .unwrap();
    TestHarness {
        engine,
        store,
        backend,
        notifier,
    }
}

/// Millisecond timestamp shorthand.
pub fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

/// Admin actor fixture.
pub fn admin() -> Actor {
    Actor::new("root", "Admin")
}

/// BG1 operator fixture.
pub fn operator() -> Actor {
    Actor::new("alice", "BG1")
}

/// Minimal draft fixture owned by BG1.
pub fn draft(name: &str, sql: &str) -> RuleDraft {
    RuleDraft::new(name, "BG1", sql)
}
