use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::{EnergyLevel, TaskRecord, TaskStatus, TaskType};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        project_id,
        name,
        status,
        category,
        priority,
        duration,
        actual_duration,
        energy_req,
        task_type,
        fixed_slot,
        dependency,
        deadline_offset,
        notes,
        scheduled_start,
        calendar_event_id,
        idempotency_key,
        is_soft_deleted,
        created_at
    FROM tasks
"#;

fn decode_error(err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

impl TryFrom<&Row<'_>> for TaskRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let status: String = row.get("status")?;
        let energy_req: String = row.get("energy_req")?;
        let task_type: String = row.get("task_type")?;

        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            name: row.get("name")?,
            status: TaskStatus::parse(&status).map_err(decode_error)?,
            category: row.get("category")?,
            priority: row.get("priority")?,
            duration: row.get("duration")?,
            actual_duration: row.get("actual_duration")?,
            energy_req: EnergyLevel::parse(&energy_req).map_err(decode_error)?,
            task_type: TaskType::parse(&task_type).map_err(decode_error)?,
            fixed_slot: row.get("fixed_slot")?,
            dependency: row.get("dependency")?,
            deadline_offset: row.get("deadline_offset")?,
            notes: row.get("notes")?,
            scheduled_start: row.get("scheduled_start")?,
            calendar_event_id: row.get("calendar_event_id")?,
            idempotency_key: row.get("idempotency_key")?,
            is_soft_deleted: row.get::<_, i64>("is_soft_deleted")? != 0,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, record: &TaskRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    project_id,
                    name,
                    status,
                    category,
                    priority,
                    duration,
                    actual_duration,
                    energy_req,
                    task_type,
                    fixed_slot,
                    dependency,
                    deadline_offset,
                    notes,
                    scheduled_start,
                    calendar_event_id,
                    idempotency_key,
                    is_soft_deleted,
                    created_at
                ) VALUES (
                    :id,
                    :project_id,
                    :name,
                    :status,
                    :category,
                    :priority,
                    :duration,
                    :actual_duration,
                    :energy_req,
                    :task_type,
                    :fixed_slot,
                    :dependency,
                    :deadline_offset,
                    :notes,
                    :scheduled_start,
                    :calendar_event_id,
                    :idempotency_key,
                    :is_soft_deleted,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &record.id,
                ":project_id": &record.project_id,
                ":name": &record.name,
                ":status": record.status.as_str(),
                ":category": &record.category,
                ":priority": record.priority,
                ":duration": record.duration,
                ":actual_duration": &record.actual_duration,
                ":energy_req": record.energy_req.as_str(),
                ":task_type": record.task_type.as_str(),
                ":fixed_slot": &record.fixed_slot,
                ":dependency": &record.dependency,
                ":deadline_offset": record.deadline_offset,
                ":notes": &record.notes,
                ":scheduled_start": &record.scheduled_start,
                ":calendar_event_id": &record.calendar_event_id,
                ":idempotency_key": &record.idempotency_key,
                ":is_soft_deleted": record.is_soft_deleted as i64,
                ":created_at": &record.created_at,
            },
        )?;

        Ok(())
    }

    pub fn get(conn: &Connection, id: &str) -> AppResult<TaskRecord> {
        let sql = format!("{BASE_SELECT} WHERE id = :id");
        let record = conn
            .query_row(&sql, named_params! { ":id": id }, |row| {
                TaskRecord::try_from(row)
            })
            .optional()?;

        record.ok_or_else(AppError::not_found)
    }

    pub fn find_by_project_and_name(
        conn: &Connection,
        project_id: &str,
        name: &str,
    ) -> AppResult<Option<TaskRecord>> {
        let sql = format!("{BASE_SELECT} WHERE project_id = :project_id AND name = :name");
        let record = conn
            .query_row(
                &sql,
                named_params! { ":project_id": project_id, ":name": name },
                |row| TaskRecord::try_from(row),
            )
            .optional()?;

        Ok(record)
    }

    /// Backlog snapshot for a plan run. The rowid tiebreak keeps the order
    /// stable when several tasks share a priority and creation instant.
    pub fn pending(conn: &Connection) -> AppResult<Vec<TaskRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE status = 'PENDING' AND is_soft_deleted = 0 ORDER BY priority DESC, created_at ASC, rowid ASC"
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| TaskRecord::try_from(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn scheduled_with_events(conn: &Connection) -> AppResult<Vec<TaskRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE status = 'SCHEDULED' AND calendar_event_id IS NOT NULL ORDER BY scheduled_start ASC"
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| TaskRecord::try_from(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn mark_scheduled(
        conn: &Connection,
        id: &str,
        scheduled_start_iso: &str,
        event_id: &str,
    ) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    status = 'SCHEDULED',
                    scheduled_start = :scheduled_start,
                    calendar_event_id = :event_id
                WHERE id = :id
            "#,
            named_params! {
                ":id": id,
                ":scheduled_start": scheduled_start_iso,
                ":event_id": event_id,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn mark_missed(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    status = 'MISSED',
                    is_soft_deleted = 1,
                    calendar_event_id = NULL
                WHERE id = :id
            "#,
            named_params! { ":id": id },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    /// Alternative to `mark_missed`: the task goes back into the backlog.
    pub fn requeue(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    status = 'PENDING',
                    scheduled_start = NULL,
                    calendar_event_id = NULL
                WHERE id = :id
            "#,
            named_params! { ":id": id },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn update_scheduled_start(conn: &Connection, id: &str, iso: &str) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE tasks SET scheduled_start = :scheduled_start WHERE id = :id",
            named_params! { ":id": id, ":scheduled_start": iso },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }
}
