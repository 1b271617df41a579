use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::{tempdir, TempDir};

use vibeplan::config::PipelineConfig;
use vibeplan::db::repositories::calendar_repository::CalendarRepository;
use vibeplan::db::repositories::history_repository::HistoryRepository;
use vibeplan::db::repositories::task_repository::TaskRepository;
use vibeplan::models::event::EventRecord;
use vibeplan::models::task::{TaskRecord, TaskStatus};
use vibeplan::services::pipeline_service::{PipelineContext, PipelineService};
use vibeplan::services::time_service::Clock;

const WEEK_TEMPLATE: &str = r#"{
    "current_mode": "Normal",
    "modes": {
        "Normal": {
            "Monday": [
                {"start": "09:00", "end": "11:00", "category": "Study", "energy_supply": "High"},
                {"start": "14:00", "end": "16:00", "category": "Code"},
                {"start": "22:00", "end": "06:00", "category": "Constant", "label": "Sleep"}
            ],
            "Tuesday": "Monday",
            "Wednesday": "Monday",
            "Thursday": "Monday",
            "Friday": "Monday"
        }
    }
}"#;

const CHEMISTRY_INPUT: &str = r#"{
    "project_name": "Chemistry",
    "default_category": "Study",
    "tasks": [
        {"name": "Ch 1", "duration": 90, "energy": "High"},
        {"name": "Ch 2", "duration": 60}
    ]
}"#;

const VIBE_INPUT: &str = r#"{
    "project_name": "VibeOs Backend",
    "default_category": "Code",
    "tasks": [
        {"name": "Backend API", "duration": 120}
    ]
}"#;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

struct Fixture {
    _dir: TempDir,
    pipeline: PipelineService,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");

    write_file(&data_dir.join("config").join("week_template.json"), WEEK_TEMPLATE);
    write_file(&data_dir.join("inputs").join("1_chemistry.json"), CHEMISTRY_INPUT);
    write_file(&data_dir.join("inputs").join("2_vibe.json"), VIBE_INPUT);

    let mut config = PipelineConfig::default();
    config.data_dir = data_dir;
    config.utc_offset_minutes = 0;

    // 2025-06-09 is a Monday.
    let now = NaiveDate::from_ymd_opt(2025, 6, 9)
        .expect("date")
        .and_hms_opt(8, 0, 0)
        .expect("time");
    let context =
        PipelineContext::bootstrap(config, Clock::fixed(now)).expect("bootstrap context");

    Fixture {
        _dir: dir,
        pipeline: PipelineService::new(Arc::new(context)),
    }
}

impl Fixture {
    fn events(&self) -> Vec<EventRecord> {
        let conn = self
            .pipeline
            .context()
            .calendar_pool
            .get_connection()
            .expect("conn");
        let user = CalendarRepository::ensure_user(&conn).expect("user");
        let feed =
            CalendarRepository::ensure_feed(&conn, &user, "VibeOS", "2025-01-01T00:00:00.000Z")
                .expect("feed");
        CalendarRepository::all_events(&conn, &feed).expect("events")
    }

    fn event_titled(&self, title: &str) -> Option<EventRecord> {
        self.events().into_iter().find(|event| event.title == title)
    }

    fn task_named(&self, name: &str) -> TaskRecord {
        let conn = self
            .pipeline
            .context()
            .task_pool
            .get_connection()
            .expect("conn");
        let mut statement = conn
            .prepare("SELECT id FROM tasks WHERE name = ?1")
            .expect("prepare");
        let id: String = statement
            .query_row([name], |row| row.get(0))
            .expect("task id");
        TaskRepository::get(&conn, &id).expect("task")
    }
}

#[test]
fn full_pipeline_ingests_plans_and_stays_idempotent() {
    let fixture = fixture();

    let report = fixture.pipeline.run("test").expect("first run");
    let reconciled = report.reconciled.expect("reconcile ran");
    assert!(!reconciled.skipped);
    assert_eq!(report.ingested, Some(3));

    let plan = report.plan.expect("plan ran");
    assert_eq!(plan.tasks_scheduled, 3);
    assert_eq!(plan.days_planned, 2);

    // Ch 1 and Backend API share Monday; Ch 2 drips into Tuesday.
    assert_eq!(
        &fixture.event_titled("Ch 1").expect("event").start[..10],
        "2025-06-09"
    );
    assert_eq!(
        &fixture.event_titled("Backend API").expect("event").start[..10],
        "2025-06-09"
    );
    assert_eq!(
        &fixture.event_titled("Ch 2").expect("event").start[..10],
        "2025-06-10"
    );
    assert_eq!(fixture.task_named("Ch 1").status, TaskStatus::Scheduled);
    assert_eq!(fixture.task_named("Ch 2").status, TaskStatus::Scheduled);

    // Constant blocks synced for both planned days.
    let sleeps = fixture
        .events()
        .into_iter()
        .filter(|event| event.title == "Sleep")
        .count();
    assert_eq!(sleeps, 2);

    let events_after_first = fixture.events().len();
    let report = fixture.pipeline.run("test").expect("second run");
    assert_eq!(report.ingested, Some(0));
    assert_eq!(report.plan.expect("plan ran").events_inserted, 0);
    assert_eq!(fixture.events().len(), events_after_first);
}

#[test]
fn externally_deleted_event_marks_the_task_missed() {
    let fixture = fixture();
    fixture.pipeline.run("test").expect("first run");

    let event = fixture.event_titled("Ch 1").expect("event");
    {
        let conn = fixture
            .pipeline
            .context()
            .calendar_pool
            .get_connection()
            .expect("conn");
        CalendarRepository::delete_event(&conn, &event.id).expect("delete");
    }

    let report = fixture.pipeline.run("test").expect("second run");
    assert_eq!(report.reconciled.expect("reconcile ran").missed, 1);

    let task = fixture.task_named("Ch 1");
    assert_eq!(task.status, TaskStatus::Missed);
    assert!(task.is_soft_deleted);
    assert!(task.calendar_event_id.is_none());
    assert!(fixture.event_titled("Ch 1").is_none());
}

#[test]
fn externally_moved_event_updates_schedule_and_history() {
    let fixture = fixture();
    fixture.pipeline.run("test").expect("first run");

    let event = fixture.event_titled("Ch 1").expect("event");
    let planned_start = event.start.clone();
    {
        let conn = fixture
            .pipeline
            .context()
            .calendar_pool
            .get_connection()
            .expect("conn");
        CalendarRepository::update_event_start(
            &conn,
            &event.id,
            "2025-06-09T09:30:00.000Z",
            "2025-06-09T11:00:00.000Z",
            "2025-06-09T00:00:00.000Z",
        )
        .expect("move event");
    }

    let report = fixture.pipeline.run("test").expect("second run");
    assert_eq!(report.reconciled.expect("reconcile ran").moved, 1);

    let task = fixture.task_named("Ch 1");
    assert_eq!(task.status, TaskStatus::Scheduled);
    assert_eq!(task.scheduled_start.as_deref(), Some("2025-06-09T09:30:00.000Z"));

    let conn = fixture
        .pipeline
        .context()
        .task_pool
        .get_connection()
        .expect("conn");
    let history = HistoryRepository::for_task(&conn, &task.id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "MOVED");
    assert_eq!(history[0].planned_start.as_deref(), Some(planned_start.as_str()));
    assert_eq!(
        history[0].actual_start.as_deref(),
        Some("2025-06-09T09:30:00.000Z")
    );
}

#[test]
fn missing_template_fails_the_plan_step() {
    let dir = tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");
    write_file(&data_dir.join("inputs").join("1_solo.json"), VIBE_INPUT);

    let mut config = PipelineConfig::default();
    config.data_dir = data_dir;

    let now = NaiveDate::from_ymd_opt(2025, 6, 9)
        .expect("date")
        .and_hms_opt(8, 0, 0)
        .expect("time");
    let context =
        PipelineContext::bootstrap(config, Clock::fixed(now)).expect("bootstrap context");
    let pipeline = PipelineService::new(Arc::new(context));

    // Reconcile and ingest still run; the plan step is terminal.
    let result = pipeline.run("test");
    assert!(result.is_err());

    let conn = pipeline.context().task_pool.get_connection().expect("conn");
    assert_eq!(TaskRepository::pending(&conn).expect("pending").len(), 1);
}
