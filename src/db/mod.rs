use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::AppResult;

pub mod repositories;

const TASK_SCHEMA_SQL: &str = include_str!("schema.sql");
const CALENDAR_SCHEMA_SQL: &str = include_str!("calendar_schema.sql");

#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
    schema: Option<&'static str>,
}

impl DbPool {
    /// Task-store pool. The schema is ensured on every connection, so the
    /// first run against an empty file bootstraps itself.
    pub fn task_store<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        Self::open(path.into(), Some(TASK_SCHEMA_SQL))
    }

    /// Calendar pool. The downstream calendar UI owns this schema; it is not
    /// re-applied per connection. `ensure_calendar_schema` creates it once
    /// when bootstrapping a fresh deployment.
    pub fn calendar<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        Self::open(path.into(), None)
    }

    fn open(path: PathBuf, schema: Option<&'static str>) -> AppResult<Self> {
        info!(target: "app::db", db_path = %path.display(), "initializing database pool");
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path, schema };
        {
            pool.get_connection()?;
        }

        Ok(pool)
    }

    pub fn ensure_calendar_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(CALENDAR_SCHEMA_SQL)?;
        Ok(())
    }

    pub fn get_connection(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn)?;
        if let Some(schema) = self.schema {
            conn.execute_batch(schema)?;
        }
        debug!(target: "app::db", db_path = %self.path.display(), "database connection ready");
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.get_connection()?;
        callback(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn configure_connection(conn: &mut Connection) -> AppResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", &1)?;
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    Ok(())
}
