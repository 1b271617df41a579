use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::{tempdir, TempDir};

use vibeplan::config::PipelineConfig;
use vibeplan::db::repositories::calendar_repository::CalendarRepository;
use vibeplan::db::repositories::project_repository::ProjectRepository;
use vibeplan::db::repositories::task_repository::TaskRepository;
use vibeplan::db::DbPool;
use vibeplan::models::event::EventRecord;
use vibeplan::models::project::ProjectRecord;
use vibeplan::models::task::{TaskRecord, TaskStatus, TaskType};
use vibeplan::models::template::{DaySchedule, TemplateBlock, WeekTemplate};
use vibeplan::services::planner_service::PlannerService;

struct Fixture {
    _dir: TempDir,
    task_pool: DbPool,
    calendar_pool: DbPool,
    config: PipelineConfig,
    project_id: String,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let mut config = PipelineConfig::default();
    config.data_dir = dir.path().join("data");
    config.utc_offset_minutes = 0;

    let task_pool = DbPool::task_store(config.task_db_path()).expect("task pool");
    let calendar_pool = DbPool::calendar(config.calendar_db_path()).expect("calendar pool");
    calendar_pool.ensure_calendar_schema().expect("calendar schema");

    let conn = task_pool.get_connection().expect("conn");
    let project = ProjectRecord::new("Course");
    ProjectRepository::insert(&conn, &project).expect("project");

    Fixture {
        _dir: dir,
        task_pool,
        calendar_pool,
        config,
        project_id: project.id,
    }
}

impl Fixture {
    fn add_task(&self, name: &str, category: &str, duration: i64, priority: i64) -> String {
        let conn = self.task_pool.get_connection().expect("conn");
        let mut task = TaskRecord::new(&self.project_id, name, "2025-01-01T00:00:00.000Z");
        task.category = category.to_string();
        task.duration = duration;
        task.priority = priority;
        TaskRepository::insert(&conn, &task).expect("insert task");
        task.id
    }

    fn add_fixed_task(&self, name: &str, category: &str, duration: i64, clock: &str) -> String {
        let conn = self.task_pool.get_connection().expect("conn");
        let mut task = TaskRecord::new(&self.project_id, name, "2025-01-01T00:00:00.000Z");
        task.category = category.to_string();
        task.duration = duration;
        task.task_type = TaskType::Fixed;
        task.fixed_slot = Some(clock.to_string());
        TaskRepository::insert(&conn, &task).expect("insert task");
        task.id
    }

    fn planner(&self) -> PlannerService {
        PlannerService::new(self.task_pool.clone(), self.calendar_pool.clone(), &self.config)
    }

    fn task(&self, id: &str) -> TaskRecord {
        let conn = self.task_pool.get_connection().expect("conn");
        TaskRepository::get(&conn, id).expect("task")
    }

    fn events(&self) -> Vec<EventRecord> {
        let conn = self.calendar_pool.get_connection().expect("conn");
        let user = CalendarRepository::ensure_user(&conn).expect("user");
        let feed = CalendarRepository::ensure_feed(&conn, &user, "VibeOS", "2025-01-01T00:00:00.000Z")
            .expect("feed");
        CalendarRepository::all_events(&conn, &feed).expect("events")
    }
}

fn block(start: &str, end: &str, category: &str) -> TemplateBlock {
    TemplateBlock {
        start: start.to_string(),
        end: end.to_string(),
        category: category.to_string(),
        label: None,
        energy_supply: None,
        notes: None,
    }
}

fn labeled(start: &str, end: &str, category: &str, label: &str) -> TemplateBlock {
    TemplateBlock {
        start: start.to_string(),
        end: end.to_string(),
        category: category.to_string(),
        label: Some(label.to_string()),
        energy_supply: None,
        notes: None,
    }
}

fn template(days: Vec<(&str, DaySchedule)>) -> WeekTemplate {
    let mut schedule = BTreeMap::new();
    for (day, entry) in days {
        schedule.insert(day.to_string(), entry);
    }
    let mut modes = BTreeMap::new();
    modes.insert("Normal".to_string(), schedule);
    WeekTemplate {
        current_mode: "Normal".to_string(),
        modes,
    }
}

// 2025-06-09 is a Monday, 2025-06-14 a Saturday.
fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 9)
        .expect("date")
        .and_hms_opt(8, 0, 0)
        .expect("time")
}

fn parse_event_time(iso: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S.000Z").expect("event time")
}

#[test]
fn single_task_is_placed_into_the_matching_slot() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
    )]);
    let task_id = fixture.add_task("A", "Code", 60, 1);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.tasks_scheduled, 1);
    assert_eq!(summary.events_inserted, 1);

    let events = fixture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "A");
    assert_eq!(events[0].start, "2025-06-09T09:00:00.000Z");
    assert_eq!(events[0].end, "2025-06-09T10:00:00.000Z");

    let task = fixture.task(&task_id);
    assert_eq!(task.status, TaskStatus::Scheduled);
    assert_eq!(task.calendar_event_id.as_deref(), Some(events[0].id.as_str()));
    assert_eq!(task.scheduled_start.as_deref(), Some(events[0].start.as_str()));
}

#[test]
fn two_tasks_fill_back_to_back_slots() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![
            block("09:00", "10:00", "Code"),
            block("10:00", "11:00", "Code"),
        ]),
    )]);
    fixture.add_task("Alpha", "Code", 60, 1);
    fixture.add_task("Beta", "Code", 60, 1);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.tasks_scheduled, 2);

    let events = fixture.events();
    assert_eq!(events.len(), 2);
    let first_end = parse_event_time(&events[0].end);
    let second_start = parse_event_time(&events[1].start);
    assert!(first_end <= second_start);
}

#[test]
fn oversized_task_stays_pending_with_no_event() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
    )]);
    let task_id = fixture.add_task("Big one", "Code", 120, 1);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.tasks_scheduled, 0);
    assert!(fixture.events().is_empty());
    assert_eq!(fixture.task(&task_id).status, TaskStatus::Pending);
}

#[test]
fn sleep_mask_keeps_early_morning_clear() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![
            labeled("22:00", "06:00", "Constant", "Sleep"),
            block("05:00", "07:00", "Code"),
        ]),
    )]);
    let task_id = fixture.add_task("Early hack", "Code", 60, 1);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.tasks_scheduled, 0);
    assert_eq!(fixture.task(&task_id).status, TaskStatus::Pending);

    let events = fixture.events();
    assert!(!events.is_empty());
    assert!(events.iter().all(|event| event.title == "Sleep"));
}

#[test]
fn calendar_offset_is_applied_on_persistence() {
    let mut fixture = fixture();
    fixture.config.utc_offset_minutes = 330;
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
    )]);
    let task_id = fixture.add_task("A", "Code", 60, 1);

    fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");

    let events = fixture.events();
    assert_eq!(events[0].start, "2025-06-09T03:30:00.000Z");
    assert_eq!(
        fixture.task(&task_id).scheduled_start.as_deref(),
        Some("2025-06-09T03:30:00.000Z")
    );
}

#[test]
fn second_run_with_unchanged_state_inserts_nothing() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![
            labeled("07:00", "08:00", "Constant", "Breakfast"),
            block("09:00", "10:00", "Code"),
        ]),
    )]);
    fixture.add_task("A", "Code", 60, 1);

    let first = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(first.tasks_scheduled, 1);
    let events_after_first = fixture.events().len();

    let second = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(second.tasks_scheduled, 0);
    assert_eq!(second.events_inserted, 0);
    assert_eq!(fixture.events().len(), events_after_first);
}

#[test]
fn requeued_task_relinks_to_its_surviving_event() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
    )]);
    let task_id = fixture.add_task("A", "Code", 60, 1);

    fixture
        .planner()
        .run(&week, monday_morning())
        .expect("first plan");
    let original_event = fixture.events()[0].clone();

    let conn = fixture.task_pool.get_connection().expect("conn");
    TaskRepository::requeue(&conn, &task_id).expect("requeue");
    drop(conn);

    let second = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("second plan");
    assert_eq!(second.tasks_scheduled, 1);
    assert_eq!(second.events_inserted, 0);

    assert_eq!(fixture.events().len(), 1);
    let task = fixture.task(&task_id);
    assert_eq!(task.status, TaskStatus::Scheduled);
    assert_eq!(task.calendar_event_id.as_deref(), Some(original_event.id.as_str()));
}

#[test]
fn drip_feed_spreads_one_subject_across_days() {
    let fixture = fixture();
    let week = template(vec![
        (
            "Monday",
            DaySchedule::Blocks(vec![block("09:00", "11:00", "Study")]),
        ),
        ("Tuesday", DaySchedule::Reference("Monday".to_string())),
    ]);
    fixture.add_task("Ch 1", "Study", 60, 10);
    fixture.add_task("Ch 2", "Study", 60, 10);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.tasks_scheduled, 2);

    let events = fixture.events();
    assert_eq!(events.len(), 2);
    let days: Vec<&str> = events.iter().map(|event| &event.start[..10]).collect();
    assert_eq!(days, ["2025-06-09", "2025-06-10"]);
}

#[test]
fn late_evening_run_starts_planning_tomorrow() {
    let fixture = fixture();
    let week = template(vec![
        (
            "Monday",
            DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
        ),
        ("Tuesday", DaySchedule::Reference("Monday".to_string())),
    ]);
    fixture.add_task("A", "Code", 60, 1);

    let late = NaiveDate::from_ymd_opt(2025, 6, 9)
        .expect("date")
        .and_hms_opt(21, 30, 0)
        .expect("time");
    fixture.planner().run(&week, late).expect("plan");

    let events = fixture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(&events[0].start[..10], "2025-06-10");
}

#[test]
fn weekend_guard_defers_study_tasks() {
    let fixture = fixture();
    let week = template(vec![(
        "Saturday",
        DaySchedule::Blocks(vec![block("09:00", "11:00", "Study")]),
    )]);
    let task_id = fixture.add_task("Revise waves", "Study", 60, 10);

    let saturday = NaiveDate::from_ymd_opt(2025, 6, 14)
        .expect("date")
        .and_hms_opt(8, 0, 0)
        .expect("time");
    let summary = fixture.planner().run(&week, saturday).expect("plan");

    assert_eq!(summary.tasks_scheduled, 0);
    assert_eq!(fixture.task(&task_id).status, TaskStatus::Pending);
    assert!(fixture.events().is_empty());
}

#[test]
fn fixed_task_lands_exactly_on_its_clock() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![
            block("06:30", "08:00", "Gym"),
            block("09:00", "10:00", "Code"),
        ]),
    )]);
    fixture.add_fixed_task("Morning workout", "Gym", 60, "06:30");

    fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");

    let events = fixture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, "2025-06-09T06:30:00.000Z");
}

#[test]
fn exhausted_run_budget_stops_at_a_day_boundary() {
    let mut fixture = fixture();
    fixture.config.max_run_seconds = 0;
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![block("09:00", "10:00", "Code")]),
    )]);
    let task_id = fixture.add_task("A", "Code", 60, 1);

    let summary = fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");
    assert_eq!(summary.days_planned, 0);
    assert_eq!(summary.tasks_scheduled, 0);
    assert_eq!(fixture.task(&task_id).status, TaskStatus::Pending);
}

#[test]
fn one_day_of_events_is_pairwise_non_overlapping() {
    let fixture = fixture();
    let week = template(vec![(
        "Monday",
        DaySchedule::Blocks(vec![
            labeled("12:00", "13:00", "Constant", "Lunch"),
            block("09:00", "11:00", "Study"),
            block("11:00", "12:00", "Code"),
            block("13:00", "15:00", "Code"),
            block("15:00", "17:00", "Free"),
        ]),
    )]);
    fixture.add_task("Ch 1", "Study", 90, 10);
    fixture.add_task("Backend API", "Code", 60, 8);
    fixture.add_task("Inbox sweep", "Admin", 45, 5);

    fixture
        .planner()
        .run(&week, monday_morning())
        .expect("plan");

    let events = fixture.events();
    assert!(events.len() >= 3);

    let intervals: Vec<(NaiveDateTime, NaiveDateTime)> = events
        .iter()
        .map(|event| (parse_event_time(&event.start), parse_event_time(&event.end)))
        .collect();
    for (index, a) in intervals.iter().enumerate() {
        for b in intervals.iter().skip(index + 1) {
            assert!(
                a.1 <= b.0 || b.1 <= a.0,
                "events overlap: {a:?} vs {b:?}"
            );
        }
    }
}
