use std::collections::HashSet;
use std::time::Instant;

use chrono::{Duration, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::db::repositories::calendar_repository::CalendarRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::task::TaskRecord;
use crate::models::template::WeekTemplate;
use crate::services::architect_service::Architect;
use crate::services::optimizer::{Optimizer, SolverTask};
use crate::services::template_service::TemplateExpander;
use crate::services::time_service::TimeUtil;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub tasks_scheduled: usize,
    pub events_inserted: usize,
    pub constants_synced: usize,
    pub days_planned: u32,
}

/// Day-by-day lookahead planner: expands one day of slots at a time, syncs
/// that day's constant blocks, feeds a balanced batch to the optimizer, and
/// cascades whatever stays unplaced into the next day's pool.
pub struct PlannerService {
    task_pool: DbPool,
    calendar_pool: DbPool,
    time: TimeUtil,
    architect: Architect,
    optimizer: Optimizer,
    feed_name: String,
    lookahead_days: u32,
    late_start_hour: u32,
    max_run: std::time::Duration,
}

impl PlannerService {
    pub fn new(task_pool: DbPool, calendar_pool: DbPool, config: &PipelineConfig) -> Self {
        Self {
            task_pool,
            calendar_pool,
            time: TimeUtil::new(config.utc_offset_minutes),
            architect: Architect::new(config.limit_per_subject),
            optimizer: Optimizer::new(),
            feed_name: config.feed_name.clone(),
            lookahead_days: config.lookahead_days,
            late_start_hour: config.late_start_hour,
            max_run: std::time::Duration::from_secs(config.max_run_seconds),
        }
    }

    pub fn run(&self, template: &WeekTemplate, now: NaiveDateTime) -> AppResult<PlanSummary> {
        let started = Instant::now();

        let task_conn = self.task_pool.get_connection()?;
        let calendar_conn = self.calendar_pool.get_connection()?;
        if !CalendarRepository::has_calendar_schema(&calendar_conn)? {
            return Err(AppError::database("calendar store schema is missing"));
        }

        let task_tx = task_conn.unchecked_transaction()?;
        let calendar_tx = calendar_conn.unchecked_transaction()?;

        let now_iso = TimeUtil::now_utc_iso();
        let user_id = CalendarRepository::ensure_user(&calendar_tx)?;
        let feed_id =
            CalendarRepository::ensure_feed(&calendar_tx, &user_id, &self.feed_name, &now_iso)?;

        // Too late in the evening: plan from tomorrow.
        let start = if now.hour() > self.late_start_hour {
            now + Duration::days(1)
        } else {
            now
        };

        let mut pool = TaskRepository::pending(&task_tx)?;
        info!(
            target: "app::planner",
            pending = pool.len(),
            start_date = %start.date(),
            lookahead = self.lookahead_days,
            "planner run started"
        );

        let mut summary = PlanSummary::default();

        for day_offset in 0..self.lookahead_days {
            if pool.is_empty() {
                break;
            }
            if started.elapsed() > self.max_run {
                warn!(
                    target: "app::planner",
                    day_offset,
                    "run budget exceeded, stopping at day boundary"
                );
                break;
            }

            let date = start.date() + Duration::days(day_offset as i64);
            let (free_slots, constant_blocks) = TemplateExpander::expand(template, date, 1)?;
            summary.days_planned += 1;

            for block in &constant_blocks {
                let start_iso = self.time.local_to_utc_iso(block.start);
                let end_iso = self.time.local_to_utc_iso(block.end);
                // Prefix over the stored form, so the check sees exactly what
                // a previous run wrote.
                let date_prefix = &start_iso[..10];
                if CalendarRepository::find_by_title_on_date(
                    &calendar_tx,
                    &feed_id,
                    &block.label,
                    date_prefix,
                )?
                .is_none()
                {
                    CalendarRepository::insert_event(
                        &calendar_tx,
                        &feed_id,
                        &block.label,
                        &start_iso,
                        &end_iso,
                        &now_iso,
                    )?;
                    summary.constants_synced += 1;
                }
            }

            if free_slots.is_empty() {
                debug!(target: "app::planner", date = %date, "no free slots, skipping day");
                continue;
            }

            let (batch, deferred) = self.architect.balanced_batch(pool);
            if batch.is_empty() {
                pool = deferred;
                continue;
            }

            let solver_tasks: Vec<SolverTask> = batch.iter().map(SolverTask::from_record).collect();
            let assignments = self.optimizer.solve(&solver_tasks, &free_slots);

            let mut scheduled_ids: HashSet<String> = HashSet::new();
            for assignment in &assignments {
                let start_iso = self.time.local_to_utc_iso(assignment.start);
                let end_iso = self.time.local_to_utc_iso(assignment.end);
                let date_prefix = start_iso[..10].to_string();

                let event_id = match CalendarRepository::find_by_title_on_date(
                    &calendar_tx,
                    &feed_id,
                    &assignment.name,
                    &date_prefix,
                )? {
                    Some(existing) => {
                        debug!(
                            target: "app::planner",
                            task = %assignment.name,
                            event_id = %existing.id,
                            "event already on calendar, relinking"
                        );
                        existing.id
                    }
                    None => {
                        summary.events_inserted += 1;
                        CalendarRepository::insert_event(
                            &calendar_tx,
                            &feed_id,
                            &assignment.name,
                            &start_iso,
                            &end_iso,
                            &now_iso,
                        )?
                    }
                };

                TaskRepository::mark_scheduled(&task_tx, &assignment.task_id, &start_iso, &event_id)?;
                scheduled_ids.insert(assignment.task_id.clone());
                summary.tasks_scheduled += 1;
                info!(
                    target: "app::planner",
                    task = %assignment.name,
                    start = %assignment.start,
                    "task scheduled"
                );
            }

            // Unplaced batch members cascade ahead of the deferred tail,
            // keeping the priority-sorted order intact.
            let mut next_pool: Vec<TaskRecord> = batch
                .into_iter()
                .filter(|task| !scheduled_ids.contains(&task.id))
                .collect();
            next_pool.extend(deferred);
            pool = next_pool;
        }

        calendar_tx.commit()?;
        task_tx.commit()?;

        info!(
            target: "app::planner",
            scheduled = summary.tasks_scheduled,
            events = summary.events_inserted,
            constants = summary.constants_synced,
            days = summary.days_planned,
            "planner run finished"
        );

        Ok(summary)
    }
}
