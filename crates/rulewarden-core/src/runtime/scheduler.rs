// crates/rulewarden-core/src/runtime/scheduler.rs
// ============================================================================
// Module: Rulewarden Scheduler
// Description: Due-schedule scan plus the background worker thread.
// Purpose: Fire rule executions at wall-clock times, once per schedule.
// Dependencies: crate::{core, interfaces, runtime::engine}, std
// ============================================================================

//! ## Overview
//! The tick is a pure function of the supplied time: select schedules due at
//! or before it, hand each to the executor, and advance the row to Executed
//! or Failed. The background worker is a single thread woken on a fixed
//! cadence through an mpsc shutdown channel; it is the only engine component
//! that reads the wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use crate::core::actor::Actor;
use crate::core::audit::AuditAction;
use crate::core::audit::AuditEntry;
use crate::core::error::EngineError;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScheduleId;
use crate::core::schedule::Schedule;
use crate::core::schedule::ScheduleStatus;
use crate::core::time::Timestamp;
use crate::interfaces::ExecutionBackend;
use crate::interfaces::Notifier;
use crate::interfaces::SqlAnalyzer;
use crate::interfaces::Store;
use crate::runtime::engine::Engine;
use crate::runtime::executor::ExecutionOptions;
use crate::runtime::lifecycle::SCHEDULES_TABLE;

// ============================================================================
// SECTION: Schedule Operations
// ============================================================================

impl<S, B, A, N> Engine<S, B, A, N>
where
    S: Store,
    B: ExecutionBackend,
    A: SqlAnalyzer,
    N: Notifier,
{
    /// Creates a schedule firing the rule at the given time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the rule does not exist.
    pub fn schedule_rule(
        &self,
        rule_id: RuleId,
        fire_at: Timestamp,
        run_data_validations: bool,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Schedule, EngineError> {
        self.rule(rule_id)?;
        let mut schedule = Schedule {
            schedule_id: ScheduleId::new(0),
            rule_id,
            fire_at,
            status: ScheduleStatus::Scheduled,
            run_data_validations,
            created_at: now,
        };
        let audit = AuditEntry::new(
            AuditAction::Schedule,
            SCHEDULES_TABLE,
            schedule.schedule_id.as_i64(),
            actor.clone(),
            None,
            serde_json::to_value(&schedule).ok(),
            now,
        );
        schedule.schedule_id = self.store.insert_schedule(&schedule, &audit)?;
        Ok(schedule)
    }

    /// Cancels a schedule that has not fired yet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when the schedule already
    /// advanced past the scheduled state.
    pub fn cancel_schedule(
        &self,
        schedule_id: ScheduleId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let Some(schedule) = self.store.schedule(schedule_id)? else {
            return Err(EngineError::NotFound(format!("schedule {schedule_id}")));
        };
        if schedule.status != ScheduleStatus::Scheduled {
            return Err(EngineError::InvariantViolation(format!(
                "schedule {schedule_id} is {} and can no longer be cancelled",
                schedule.status.as_str()
            )));
        }
        let audit = AuditEntry::new(
            AuditAction::CancelSchedule,
            SCHEDULES_TABLE,
            schedule_id.as_i64(),
            actor.clone(),
            serde_json::to_value(&schedule).ok(),
            None,
            now,
        );
        self.store.set_schedule_status(schedule_id, ScheduleStatus::Cancelled, Some(&audit))?;
        Ok(())
    }

    /// Runs every schedule due at or before the given time.
    ///
    /// Each schedule advances exactly once: to Executed when the executor
    /// returns, or to Failed when it raises at top level. Failures never stop
    /// the scan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the due-scan itself or a status write
    /// fails.
    pub fn run_due_schedules(
        &self,
        now: Timestamp,
    ) -> Result<Vec<(ScheduleId, ScheduleStatus)>, EngineError> {
        let due = self.store.due_schedules(now)?;
        let mut advanced = Vec::with_capacity(due.len());
        for schedule in due {
            let options = ExecutionOptions {
                start_ids: vec![schedule.rule_id],
                skip_validations: !schedule.run_data_validations,
            };
            let status = match self.execute(&options, now) {
                Ok(_) => ScheduleStatus::Executed,
                Err(err) => {
                    tracing::warn!(
                        schedule = %schedule.schedule_id,
                        rule = %schedule.rule_id,
                        error = %err,
                        "scheduled execution failed"
                    );
                    ScheduleStatus::Failed
                }
            };
            self.store.set_schedule_status(schedule.schedule_id, status, None)?;
            advanced.push((schedule.schedule_id, status));
        }
        Ok(advanced)
    }
}

// ============================================================================
// SECTION: Background Worker
// ============================================================================

/// Background scheduler thread woken on a fixed cadence.
///
/// # Invariants
/// - A single worker serves an engine; each schedule advances exactly once
///   per firing.
pub struct SchedulerWorker {
    /// Shutdown signal into the worker thread.
    shutdown: mpsc::Sender<()>,
    /// Worker thread handle, taken on shutdown.
    handle: Option<thread::JoinHandle<()>>,
}

impl SchedulerWorker {
    /// Spawns the worker over a shared engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Backend`] when the thread cannot be spawned.
    pub fn spawn<S, B, A, N>(engine: Arc<Engine<S, B, A, N>>) -> Result<Self, EngineError>
    where
        S: Store + Send + Sync + 'static,
        B: ExecutionBackend + Send + Sync + 'static,
        A: SqlAnalyzer + Send + Sync + 'static,
        N: Notifier + Send + Sync + 'static,
    {
        let cadence = Duration::from_millis(engine.settings().scheduler_cadence_ms);
        let (shutdown, signal) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("rulewarden-scheduler".to_string())
            .spawn(move || {
                loop {
                    match signal.recv_timeout(cadence) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            let now = Timestamp::now();
                            match engine.run_due_schedules(now) {
                                Ok(advanced) if !advanced.is_empty() => {
                                    tracing::info!(count = advanced.len(), "schedules fired");
                                }
                                Ok(_) => {}
                                Err(err) => {
                                    tracing::warn!(error = %err, "scheduler tick failed");
                                }
                            }
                        }
                    }
                }
            })
            .map_err(|err| EngineError::Backend(err.to_string()))?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signals the worker to stop and waits for it to exit.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    /// Sends the shutdown signal and joins the thread once.
    fn stop_inner(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SchedulerWorker {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
