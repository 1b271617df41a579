use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::project::ProjectRecord;

impl TryFrom<&Row<'_>> for ProjectRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category: row.get("category")?,
            priority: row.get("priority")?,
            color: row.get("color")?,
            tags: row.get("tags")?,
            reality_factor: row.get("reality_factor")?,
        })
    }
}

pub struct ProjectRepository;

impl ProjectRepository {
    pub fn insert(conn: &Connection, record: &ProjectRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO projects (id, name, category, priority, color, tags, reality_factor)
                VALUES (:id, :name, :category, :priority, :color, :tags, :reality_factor)
            "#,
            named_params! {
                ":id": &record.id,
                ":name": &record.name,
                ":category": &record.category,
                ":priority": record.priority,
                ":color": &record.color,
                ":tags": &record.tags,
                ":reality_factor": record.reality_factor,
            },
        )?;

        Ok(())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<ProjectRecord>> {
        let record = conn
            .query_row(
                "SELECT id, name, category, priority, color, tags, reality_factor FROM projects WHERE name = :name",
                named_params! { ":name": name },
                |row| ProjectRecord::try_from(row),
            )
            .optional()?;

        Ok(record)
    }

    pub fn get(conn: &Connection, id: &str) -> AppResult<ProjectRecord> {
        let record = conn
            .query_row(
                "SELECT id, name, category, priority, color, tags, reality_factor FROM projects WHERE id = :id",
                named_params! { ":id": id },
                |row| ProjectRecord::try_from(row),
            )
            .optional()?;

        record.ok_or_else(AppError::not_found)
    }

    pub fn update_priority(conn: &Connection, id: &str, priority: i64) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE projects SET priority = :priority WHERE id = :id",
            named_params! { ":id": id, ":priority": priority },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }
}
