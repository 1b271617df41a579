use rusqlite::{named_params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::event::EventRecord;

const EVENT_SELECT: &str = r#"
    SELECT id, feedId, title, start, "end", allDay, createdAt, updatedAt
    FROM CalendarEvent
"#;

impl TryFrom<&Row<'_>> for EventRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            feed_id: row.get("feedId")?,
            title: row.get("title")?,
            start: row.get("start")?,
            end: row.get("end")?,
            all_day: row.get::<_, i64>("allDay")? != 0,
            created_at: row.get("createdAt")?,
            updated_at: row.get("updatedAt")?,
        })
    }
}

pub struct CalendarRepository;

impl CalendarRepository {
    /// The calendar DB belongs to the downstream UI, so its tables may be
    /// missing entirely. Callers use this before touching any of them.
    pub fn has_calendar_schema(conn: &Connection) -> AppResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('User', 'CalendarFeed', 'CalendarEvent')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 3)
    }

    pub fn ensure_user(conn: &Connection) -> AppResult<String> {
        let existing: Option<String> = conn
            .query_row("SELECT id FROM User LIMIT 1", [], |row| row.get(0))
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = format!("user_default_{}", &Uuid::new_v4().to_string()[..8]);
        conn.execute(
            "INSERT INTO User (id, email, name) VALUES (:id, :email, :name)",
            named_params! {
                ":id": &id,
                ":email": "admin@vibeos.com",
                ":name": "Vibe Admin",
            },
        )?;

        Ok(id)
    }

    pub fn ensure_feed(
        conn: &Connection,
        user_id: &str,
        name: &str,
        now_iso: &str,
    ) -> AppResult<String> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM CalendarFeed WHERE name = :name AND userId = :user_id",
                named_params! { ":name": name, ":user_id": user_id },
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
                INSERT INTO CalendarFeed (id, name, type, enabled, userId, createdAt, updatedAt)
                VALUES (:id, :name, 'LOCAL', 1, :user_id, :now, :now)
            "#,
            named_params! { ":id": &id, ":name": name, ":user_id": user_id, ":now": now_iso },
        )?;

        Ok(id)
    }

    pub fn insert_event(
        conn: &Connection,
        feed_id: &str,
        title: &str,
        start_iso: &str,
        end_iso: &str,
        now_iso: &str,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
                INSERT INTO CalendarEvent (id, feedId, title, start, "end", allDay, createdAt, updatedAt)
                VALUES (:id, :feed_id, :title, :start, :end, 0, :now, :now)
            "#,
            named_params! {
                ":id": &id,
                ":feed_id": feed_id,
                ":title": title,
                ":start": start_iso,
                ":end": end_iso,
                ":now": now_iso,
            },
        )?;

        Ok(id)
    }

    /// First event in a feed carrying `title` whose start falls on the given
    /// `YYYY-MM-DD` prefix. Drives the planner's skip-if-present checks.
    pub fn find_by_title_on_date(
        conn: &Connection,
        feed_id: &str,
        title: &str,
        date_prefix: &str,
    ) -> AppResult<Option<EventRecord>> {
        let sql = format!(
            "{EVENT_SELECT} WHERE feedId = :feed_id AND title = :title AND start LIKE :prefix ORDER BY start ASC"
        );
        let record = conn
            .query_row(
                &sql,
                named_params! {
                    ":feed_id": feed_id,
                    ":title": title,
                    ":prefix": format!("{date_prefix}%"),
                },
                |row| EventRecord::try_from(row),
            )
            .optional()?;

        Ok(record)
    }

    pub fn get_event(conn: &Connection, event_id: &str) -> AppResult<Option<EventRecord>> {
        let sql = format!("{EVENT_SELECT} WHERE id = :id");
        let record = conn
            .query_row(&sql, named_params! { ":id": event_id }, |row| {
                EventRecord::try_from(row)
            })
            .optional()?;

        Ok(record)
    }

    pub fn delete_event(conn: &Connection, event_id: &str) -> AppResult<()> {
        let affected = conn.execute(
            "DELETE FROM CalendarEvent WHERE id = :id",
            named_params! { ":id": event_id },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    /// Used by the downstream UI when dragging an event; exposed here so the
    /// reconciler paths can be exercised without that UI.
    pub fn update_event_start(
        conn: &Connection,
        event_id: &str,
        start_iso: &str,
        end_iso: &str,
        now_iso: &str,
    ) -> AppResult<()> {
        let affected = conn.execute(
            r#"UPDATE CalendarEvent SET start = :start, "end" = :end, updatedAt = :now WHERE id = :id"#,
            named_params! { ":id": event_id, ":start": start_iso, ":end": end_iso, ":now": now_iso },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn all_events(conn: &Connection, feed_id: &str) -> AppResult<Vec<EventRecord>> {
        let sql = format!("{EVENT_SELECT} WHERE feedId = :feed_id ORDER BY start ASC");
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(named_params! { ":feed_id": feed_id }, |row| {
            EventRecord::try_from(row)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
