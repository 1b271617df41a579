use tracing::{info, warn};

use crate::config::MissedTaskPolicy;
use crate::db::repositories::calendar_repository::CalendarRepository;
use crate::db::repositories::history_repository::HistoryRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::DbPool;
use crate::error::AppResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub moved: usize,
    pub missed: usize,
    pub skipped: bool,
}

/// The ghost pass: reads what the user did to the calendar (moved or deleted
/// events) and folds it back into task state. It never re-schedules; the
/// next planner run deals with the fallout.
pub struct ReconcileService {
    task_pool: DbPool,
    calendar_pool: DbPool,
    policy: MissedTaskPolicy,
}

impl ReconcileService {
    pub fn new(task_pool: DbPool, calendar_pool: DbPool, policy: MissedTaskPolicy) -> Self {
        Self {
            task_pool,
            calendar_pool,
            policy,
        }
    }

    pub fn run(&self) -> AppResult<ReconcileSummary> {
        // A missing or half-initialized calendar DB skips the pass instead
        // of failing the pipeline: the stores converge on a later run.
        let calendar_conn = match self.calendar_pool.get_connection() {
            Ok(conn) => conn,
            Err(err) => {
                warn!(
                    target: "app::reconcile",
                    error = %err,
                    "calendar store unreachable, skipping ghost pass"
                );
                return Ok(ReconcileSummary {
                    skipped: true,
                    ..ReconcileSummary::default()
                });
            }
        };
        if !CalendarRepository::has_calendar_schema(&calendar_conn)? {
            warn!(target: "app::reconcile", "calendar schema incomplete, skipping ghost pass");
            return Ok(ReconcileSummary {
                skipped: true,
                ..ReconcileSummary::default()
            });
        }

        let task_conn = self.task_pool.get_connection()?;
        let task_tx = task_conn.unchecked_transaction()?;

        let mut summary = ReconcileSummary::default();

        for task in TaskRepository::scheduled_with_events(&task_tx)? {
            let Some(event_id) = task.calendar_event_id.as_deref() else {
                continue;
            };

            match CalendarRepository::get_event(&calendar_conn, event_id)? {
                None => {
                    info!(
                        target: "app::reconcile",
                        task = %task.name,
                        "event deleted in calendar UI"
                    );
                    match self.policy {
                        MissedTaskPolicy::SoftDelete => {
                            TaskRepository::mark_missed(&task_tx, &task.id)?
                        }
                        MissedTaskPolicy::Requeue => TaskRepository::requeue(&task_tx, &task.id)?,
                    }
                    summary.missed += 1;
                }
                Some(event) => {
                    if task.scheduled_start.as_deref() != Some(event.start.as_str()) {
                        info!(
                            target: "app::reconcile",
                            task = %task.name,
                            old = task.scheduled_start.as_deref().unwrap_or("-"),
                            new = %event.start,
                            "event moved in calendar UI"
                        );
                        TaskRepository::update_scheduled_start(&task_tx, &task.id, &event.start)?;
                        HistoryRepository::append(
                            &task_tx,
                            &task.id,
                            "MOVED",
                            task.scheduled_start.as_deref(),
                            Some(&event.start),
                        )?;
                        summary.moved += 1;
                    }
                }
            }
        }

        task_tx.commit()?;
        info!(
            target: "app::reconcile",
            moved = summary.moved,
            missed = summary.missed,
            "ghost pass finished"
        );
        Ok(summary)
    }
}
