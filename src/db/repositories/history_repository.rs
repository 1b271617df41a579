use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::task::HistoryRecord;

impl TryFrom<&Row<'_>> for HistoryRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            task_id: row.get("task_id")?,
            action: row.get("action")?,
            planned_start: row.get("planned_start")?,
            actual_start: row.get("actual_start")?,
        })
    }
}

pub struct HistoryRepository;

impl HistoryRepository {
    pub fn append(
        conn: &Connection,
        task_id: &str,
        action: &str,
        planned_start: Option<&str>,
        actual_start: Option<&str>,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO history_log (task_id, action, planned_start, actual_start)
                VALUES (:task_id, :action, :planned_start, :actual_start)
            "#,
            named_params! {
                ":task_id": task_id,
                ":action": action,
                ":planned_start": planned_start,
                ":actual_start": actual_start,
            },
        )?;

        Ok(())
    }

    pub fn for_task(conn: &Connection, task_id: &str) -> AppResult<Vec<HistoryRecord>> {
        let mut statement = conn.prepare(
            r#"
                SELECT task_id, action, planned_start, actual_start
                FROM history_log
                WHERE task_id = :task_id
                ORDER BY id ASC
            "#,
        )?;
        let rows = statement.query_map(named_params! { ":task_id": task_id }, |row| {
            HistoryRecord::try_from(row)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
