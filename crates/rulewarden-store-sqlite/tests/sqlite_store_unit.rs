// crates/rulewarden-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Schema round-trips, atomicity, locks, and the probe backend.
// Purpose: Validate the durable store against the persistence contract.
// ============================================================================

//! SQLite store tests over in-memory and temp-file databases.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions and helpers are permitted."
)]

use rulewarden_core::ActionType;
use rulewarden_core::Actor;
use rulewarden_core::ApprovalRow;
use rulewarden_core::ApprovalStatus;
use rulewarden_core::ApprovedFlag;
use rulewarden_core::AuditAction;
use rulewarden_core::AuditEntry;
use rulewarden_core::AuditQuery;
use rulewarden_core::ColumnOp;
use rulewarden_core::CriticalScope;
use rulewarden_core::ExecutionBackend;
use rulewarden_core::GroupName;
use rulewarden_core::LifecycleState;
use rulewarden_core::LockAttempt;
use rulewarden_core::OperationKind;
use rulewarden_core::Rule;
use rulewarden_core::RuleId;
use rulewarden_core::RuleLock;
use rulewarden_core::RuleStatus;
use rulewarden_core::Schedule;
use rulewarden_core::ScheduleId;
use rulewarden_core::ScheduleStatus;
use rulewarden_core::Store;
use rulewarden_core::StoreError;
use rulewarden_core::TableDependency;
use rulewarden_core::Timestamp;
use rulewarden_core::UserName;
use rulewarden_store_sqlite::SqliteStore;
use rulewarden_store_sqlite::SqliteStoreConfig;

/// Millisecond timestamp shorthand.
fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

/// Admin actor fixture.
fn admin() -> Actor {
    Actor::new("root", "Admin")
}

/// Rule fixture with every enum populated.
fn rule_fixture(name: &str) -> Rule {
    Rule {
        rule_id: RuleId::new(0),
        name: name.to_string(),
        sql: Some("SELECT 1 FROM inventory".to_string()),
        rule_type: "standard".to_string(),
        owner_group: GroupName::new("BG1"),
        parent_rule_id: None,
        group_id: Some(3),
        effective_start: Some(ts(100)),
        effective_end: None,
        operation_kind: OperationKind::Select,
        is_global: false,
        critical_rule: true,
        critical_scope: CriticalScope::Group,
        cdc_type: Some("full".to_string()),
        status: RuleStatus::Inactive,
        approval_status: ApprovalStatus::ApprovalInProgress,
        lifecycle_state: LifecycleState::UnderApproval,
        version: 1,
        created_by: UserName::new("root"),
        created_at: ts(1_000),
        updated_by: UserName::new("root"),
        updated_at: ts(1_000),
        decision_table_id: None,
        logic_expr: None,
    }
}

/// Audit fixture for an insert.
fn insert_audit() -> AuditEntry {
    AuditEntry::new(AuditAction::Insert, "BRM_RULES", 0, admin(), None, None, ts(1_000))
}

#[test]
fn rule_insert_assigns_ids_and_round_trips() {
    let store = SqliteStore::in_memory().unwrap();
    let dependencies = vec![TableDependency {
        rule_id: RuleId::new(0),
        database_name: None,
        table_name: "inventory".to_string(),
        column_name: None,
        column_op: ColumnOp::Read,
    }];

    let assigned =
        store.insert_rule(&rule_fixture("R"), &dependencies, &insert_audit()).unwrap();
    let loaded = store.rule(assigned).unwrap().unwrap();
    assert_eq!(loaded.name, "R");
    assert_eq!(loaded.operation_kind, OperationKind::Select);
    assert_eq!(loaded.critical_scope, CriticalScope::Group);
    assert_eq!(loaded.status, RuleStatus::Inactive);
    assert_eq!(loaded.effective_start, Some(ts(100)));

    // Dependency and audit rows carry the assigned identifier.
    let deps = store.table_dependencies(assigned).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].rule_id, assigned);
    let audits = store
        .audit_entries(&AuditQuery {
            record_id: Some(assigned.as_i64()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, AuditAction::Insert);
    assert_eq!(audits[0].actor, admin());
}

#[test]
fn duplicate_names_are_rejected_per_group() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap();

    let err = store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(_)));

    let mut other_group = rule_fixture("R");
    other_group.owner_group = GroupName::new("BG2");
    store.insert_rule(&other_group, &[], &insert_audit()).unwrap();
}

#[test]
fn rule_by_name_and_children_queries() {
    let store = SqliteStore::in_memory().unwrap();
    let parent = store.insert_rule(&rule_fixture("P"), &[], &insert_audit()).unwrap();
    let mut child = rule_fixture("C");
    child.parent_rule_id = Some(parent);
    store.insert_rule(&child, &[], &insert_audit()).unwrap();

    let found = store.rule_by_name(&GroupName::new("BG1"), "P").unwrap().unwrap();
    assert_eq!(found.rule_id, parent);
    let children = store.children_of(parent).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "C");
}

#[test]
fn update_replaces_dependencies_atomically() {
    let store = SqliteStore::in_memory().unwrap();
    let dependencies = vec![TableDependency {
        rule_id: RuleId::new(0),
        database_name: None,
        table_name: "inventory".to_string(),
        column_name: None,
        column_op: ColumnOp::Read,
    }];
    let assigned =
        store.insert_rule(&rule_fixture("R"), &dependencies, &insert_audit()).unwrap();

    let mut updated = store.rule(assigned).unwrap().unwrap();
    updated.sql = Some("UPDATE orders SET total = 1".to_string());
    updated.operation_kind = OperationKind::Update;
    updated.version = 2;
    let new_dependencies = vec![TableDependency {
        rule_id: assigned,
        database_name: None,
        table_name: "orders".to_string(),
        column_name: Some("total".to_string()),
        column_op: ColumnOp::Write,
    }];
    let audit = AuditEntry::new(
        AuditAction::Update,
        "BRM_RULES",
        assigned.as_i64(),
        admin(),
        None,
        None,
        ts(2_000),
    );
    store.update_rule(&updated, Some(&new_dependencies), &audit).unwrap();

    let deps = store.table_dependencies(assigned).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].table_name, "orders");
    assert_eq!(deps[0].column_op, ColumnOp::Write);
    assert_eq!(store.rule(assigned).unwrap().unwrap().version, 2);
}

#[test]
fn remove_rule_clears_related_rows() {
    let store = SqliteStore::in_memory().unwrap();
    let assigned = store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap();
    let rows = vec![ApprovalRow {
        rule_id: assigned,
        group_name: GroupName::new("BG1"),
        username: UserName::new("alice"),
        approved_flag: ApprovedFlag::Pending,
        approval_stage: 1,
        action_type: ActionType::CreateOrUpdate,
        decided_at: None,
    }];
    store.replace_approvals(assigned, ActionType::CreateOrUpdate, &rows).unwrap();

    let audit = AuditEntry::new(
        AuditAction::Delete,
        "BRM_RULES",
        assigned.as_i64(),
        admin(),
        None,
        None,
        ts(3_000),
    );
    store.remove_rule(assigned, &audit).unwrap();
    assert!(store.rule(assigned).unwrap().is_none());
    assert!(store.approvals(assigned, ActionType::CreateOrUpdate).unwrap().is_empty());
}

#[test]
fn apply_approval_flips_exactly_one_pending_row() {
    let store = SqliteStore::in_memory().unwrap();
    let assigned = store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap();
    let rows = vec![
        ApprovalRow {
            rule_id: assigned,
            group_name: GroupName::new("BG1"),
            username: UserName::new("alice"),
            approved_flag: ApprovedFlag::Pending,
            approval_stage: 1,
            action_type: ActionType::CreateOrUpdate,
            decided_at: None,
        },
        ApprovalRow {
            rule_id: assigned,
            group_name: GroupName::new("FINAL"),
            username: UserName::new("chief"),
            approved_flag: ApprovedFlag::Pending,
            approval_stage: 2,
            action_type: ActionType::CreateOrUpdate,
            decided_at: None,
        },
    ];
    store.replace_approvals(assigned, ActionType::CreateOrUpdate, &rows).unwrap();

    let mut decided = rows[0].clone();
    decided.approved_flag = ApprovedFlag::Approved;
    decided.decided_at = Some(ts(5_000));
    let mut rule = store.rule(assigned).unwrap().unwrap();
    rule.version = 2;
    let audit = AuditEntry::new(
        AuditAction::Approve,
        "BRM_RULES",
        assigned.as_i64(),
        admin(),
        None,
        None,
        ts(5_000),
    );
    store.apply_approval(&rule, &decided, &audit).unwrap();

    let stored = store.approvals(assigned, ActionType::CreateOrUpdate).unwrap();
    assert_eq!(stored[0].approved_flag, ApprovedFlag::Approved);
    assert_eq!(stored[0].decided_at, Some(ts(5_000)));
    assert_eq!(stored[1].approved_flag, ApprovedFlag::Pending);

    // A second apply on the same row finds nothing pending.
    let err = store.apply_approval(&rule, &decided, &audit).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn lock_acquisition_is_atomic_with_lazy_expiry() {
    let store = SqliteStore::in_memory().unwrap();
    let assigned = store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap();
    let lock = RuleLock {
        rule_id: assigned,
        locked_by: UserName::new("alice"),
        acquired_at: ts(1_000),
        expires_at: ts(61_000),
        force_lock: false,
        active: true,
    };

    assert!(matches!(
        store.try_acquire_lock(&lock, ts(1_000), false).unwrap(),
        LockAttempt::Acquired(_)
    ));

    let mut second = lock.clone();
    second.locked_by = UserName::new("bob");
    match store.try_acquire_lock(&second, ts(2_000), false).unwrap() {
        LockAttempt::HeldBy {
            owner,
            expires_at,
        } => {
            assert_eq!(owner.as_str(), "alice");
            assert_eq!(expires_at, ts(61_000));
        }
        LockAttempt::Acquired(_) => panic!("expected HeldBy"),
    }

    // Past expiry the lock reads as absent and a new owner can take it.
    assert!(store.active_lock(assigned, ts(62_000)).unwrap().is_none());
    assert!(matches!(
        store.try_acquire_lock(&second, ts(62_001), false).unwrap(),
        LockAttempt::Acquired(_)
    ));

    // Force acquisition preempts the live lock.
    let mut forced = lock.clone();
    forced.locked_by = UserName::new("root");
    forced.force_lock = true;
    assert!(matches!(
        store.try_acquire_lock(&forced, ts(62_002), true).unwrap(),
        LockAttempt::Acquired(_)
    ));
    let owner = store.active_lock(assigned, ts(62_003)).unwrap().unwrap();
    assert_eq!(owner.locked_by.as_str(), "root");

    store.release_lock(assigned).unwrap();
    assert!(store.active_lock(assigned, ts(62_004)).unwrap().is_none());
}

#[test]
fn schedules_round_trip_and_due_scan_filters() {
    let store = SqliteStore::in_memory().unwrap();
    let assigned = store.insert_rule(&rule_fixture("R"), &[], &insert_audit()).unwrap();
    let schedule = Schedule {
        schedule_id: ScheduleId::new(0),
        rule_id: assigned,
        fire_at: ts(60_000),
        status: ScheduleStatus::Scheduled,
        run_data_validations: true,
        created_at: ts(1_000),
    };
    let audit = AuditEntry::new(
        AuditAction::Schedule,
        "RULE_SCHEDULES",
        0,
        admin(),
        None,
        None,
        ts(1_000),
    );
    let schedule_id = store.insert_schedule(&schedule, &audit).unwrap();

    assert!(store.due_schedules(ts(59_999)).unwrap().is_empty());
    let due = store.due_schedules(ts(60_000)).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].schedule_id, schedule_id);
    assert!(due[0].run_data_validations);

    store.set_schedule_status(schedule_id, ScheduleStatus::Executed, None).unwrap();
    assert!(store.due_schedules(ts(60_001)).unwrap().is_empty());
    assert_eq!(
        store.schedule(schedule_id).unwrap().unwrap().status,
        ScheduleStatus::Executed
    );
}

#[test]
fn audit_entries_filter_by_query_fields() {
    let store = SqliteStore::in_memory().unwrap();
    let first = store.insert_rule(&rule_fixture("A"), &[], &insert_audit()).unwrap();
    store.insert_rule(&rule_fixture("B"), &[], &insert_audit()).unwrap();

    let by_record = store
        .audit_entries(&AuditQuery {
            record_id: Some(first.as_i64()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(by_record.len(), 1);

    let by_actor = store
        .audit_entries(&AuditQuery {
            actor: Some(UserName::new("root")),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(by_actor.len(), 2);

    let in_window = store
        .audit_entries(&AuditQuery {
            from: Some(ts(500)),
            to: Some(ts(1_500)),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(in_window.len(), 2);
}

#[test]
fn execute_rule_sql_probes_and_commits_on_pass() {
    let store = SqliteStore::in_memory().unwrap();

    // Pass: first column of the first row equals 1.
    let probe = store.execute_rule_sql("SELECT 1").unwrap();
    assert!(probe.passes());
    assert_eq!(probe.first_value, Some(1));

    // Fail: first column equals 0.
    let probe = store.execute_rule_sql("SELECT 0").unwrap();
    assert!(!probe.passes());

    // Mutating statements with no result rows pass and commit.
    store
        .execute_rule_sql("CREATE TABLE inventory (id INTEGER PRIMARY KEY, qty INTEGER)")
        .unwrap();
    let probe = store
        .execute_rule_sql("INSERT INTO inventory (qty) VALUES (5), (7)")
        .unwrap();
    assert!(probe.passes());
    assert_eq!(probe.record_count, 2);
    let count = store.count_nulls("inventory", "qty").unwrap();
    assert_eq!(count, 0);
}

#[test]
fn failing_probe_rolls_the_transaction_back() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .execute_rule_sql("CREATE TABLE audit_rows (id INTEGER PRIMARY KEY, note TEXT)")
        .unwrap();

    // The CTE inserts nothing, but a multi-statement batch cannot sneak a
    // mutation past a failing probe: the returned 0 rolls everything back.
    let probe = store
        .execute_rule_sql(
            "SELECT CASE WHEN (SELECT COUNT(*) FROM audit_rows) = 0 THEN 0 ELSE 1 END",
        )
        .unwrap();
    assert!(!probe.passes());

    let missing = store.execute_rule_sql("SELECT 1 FROM not_a_table").unwrap_err();
    assert!(matches!(
        missing,
        rulewarden_core::ExecutionBackendError::MissingObject(_)
    ));
}

#[test]
fn validation_queries_run_against_real_tables() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .execute_rule_sql(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, total INTEGER, customer_id INTEGER)",
        )
        .unwrap();
    store
        .execute_rule_sql(
            "INSERT INTO orders (total, customer_id) VALUES (5, 1), (NULL, 2), (500, 9)",
        )
        .unwrap();
    store.execute_rule_sql("CREATE TABLE customers (id INTEGER PRIMARY KEY)").unwrap();
    store.execute_rule_sql("INSERT INTO customers (id) VALUES (1), (2)").unwrap();

    assert_eq!(store.count_nulls("orders", "total").unwrap(), 1);
    assert_eq!(store.count_outside_range("orders", "total", 0.0, 100.0).unwrap(), 1);
    assert_eq!(store.count_missing_references("orders", "customer_id", "customers", "id").unwrap(), 1);
    let samples = store.sample_values("orders", "total", 500).unwrap();
    assert_eq!(samples.len(), 2);
}

#[test]
fn missing_mapping_table_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brm.db");
    let config = SqliteStoreConfig {
        path: path.clone(),
        busy_timeout_ms: 1_000,
        durability: rulewarden_store_sqlite::DurabilityProfile::Scratch,
    };
    drop(SqliteStore::new(&config).unwrap());

    // Simulate a deployment predating the mapping table.
    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch("DROP TABLE BRM_COLUMN_MAPPINGS;").unwrap();
    drop(raw);

    let reopened = SqliteStore::new(&config).unwrap();
    assert!(reopened.column_mappings().unwrap().is_empty());
}
