use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::repositories::project_repository::ProjectRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::ingest::{ProjectDocument, TaskEntry};
use crate::models::project::ProjectRecord;
use crate::models::task::{TaskRecord, TaskStatus, TaskType};
use crate::services::time_service::TimeUtil;

/// Files without a numeric prefix sort after every prefixed file.
const UNPREFIXED_SORT_KEY: i64 = 999;

/// Reads project documents from the inputs directory and upserts them into
/// the task store. Re-running over an unchanged directory inserts nothing:
/// projects dedup by name, tasks by (project, name).
pub struct IngestService {
    pool: DbPool,
    inputs_dir: PathBuf,
}

impl IngestService {
    pub fn new(pool: DbPool, inputs_dir: PathBuf) -> Self {
        Self { pool, inputs_dir }
    }

    /// Returns the number of newly inserted tasks. Unparseable files are
    /// logged and skipped; the rest of the directory still ingests.
    pub fn run(&self) -> AppResult<usize> {
        if !self.inputs_dir.exists() {
            warn!(target: "app::ingest", dir = %self.inputs_dir.display(), "inputs directory missing, creating it");
            fs::create_dir_all(&self.inputs_dir)?;
            return Ok(0);
        }

        let files = self.input_files()?;
        if files.is_empty() {
            info!(target: "app::ingest", "no input files found");
            return Ok(0);
        }

        let conn = self.pool.get_connection()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        for path in &files {
            match Self::ingest_file(&tx, path) {
                Ok(count) => inserted += count,
                Err(err) => {
                    warn!(
                        target: "app::ingest",
                        file = %path.display(),
                        error = %err,
                        "input file skipped"
                    );
                }
            }
        }

        tx.commit()?;
        info!(target: "app::ingest", files = files.len(), inserted, "ingestion finished");
        Ok(inserted)
    }

    /// `N_`-prefixed files first, ascending by N; the rest at the tail in
    /// name order.
    fn input_files(&self) -> AppResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.inputs_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
            })
            .collect();

        files.sort_by_key(|path| {
            let order = numeric_prefix(path).unwrap_or(UNPREFIXED_SORT_KEY);
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (order, name)
        });

        Ok(files)
    }

    fn ingest_file(conn: &Connection, path: &Path) -> AppResult<usize> {
        let raw = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;

        // A file holds either one document or a list of them.
        let documents: Vec<ProjectDocument> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        let file_priority = numeric_prefix(path).map(file_priority_for);

        let mut inserted = 0;
        for document in &documents {
            inserted += Self::ingest_document(conn, document, file_priority)?;
        }
        Ok(inserted)
    }

    fn ingest_document(
        conn: &Connection,
        document: &ProjectDocument,
        file_priority: Option<i64>,
    ) -> AppResult<usize> {
        // A filename prefix outranks whatever the document claims.
        let project_priority = file_priority.or(document.priority).unwrap_or(1);
        let category = document.category();

        let project_id = match ProjectRepository::find_by_name(conn, &document.project_name)? {
            Some(existing) => {
                ProjectRepository::update_priority(conn, &existing.id, project_priority)?;
                existing.id
            }
            None => {
                let mut record = ProjectRecord::new(&document.project_name);
                record.category = category.clone();
                record.priority = project_priority;
                if let Some(color) = &document.color {
                    record.color = color.clone();
                }
                record.tags = document.tags.join(",");
                record.reality_factor = document.reality_factor;
                ProjectRepository::insert(conn, &record)?;
                info!(
                    target: "app::ingest",
                    project = %record.name,
                    priority = record.priority,
                    "new project"
                );
                record.id
            }
        };

        let mut inserted = 0;
        for entry in &document.tasks {
            match Self::insert_task_if_absent(conn, &project_id, &category, project_priority, entry)
            {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        target: "app::ingest",
                        project = %document.project_name,
                        task = %entry.name,
                        error = %err,
                        "task entry skipped"
                    );
                }
            }
        }
        Ok(inserted)
    }

    fn insert_task_if_absent(
        conn: &Connection,
        project_id: &str,
        project_category: &str,
        project_priority: i64,
        entry: &TaskEntry,
    ) -> AppResult<bool> {
        if TaskRepository::find_by_project_and_name(conn, project_id, &entry.name)?.is_some() {
            return Ok(false);
        }

        if entry.task_type == TaskType::Fixed {
            let clock = entry
                .fixed_slot
                .as_deref()
                .ok_or_else(|| AppError::validation("fixed task without fixed_slot"))?;
            TimeUtil::parse_clock(clock)?;
        }

        let mut task = TaskRecord::new(project_id, &entry.name, TimeUtil::now_utc_iso());
        task.category = entry
            .category
            .clone()
            .unwrap_or_else(|| project_category.to_string());
        task.priority = entry.priority.unwrap_or(project_priority);
        task.duration = entry.duration;
        task.energy_req = entry.energy;
        task.task_type = entry.task_type;
        task.fixed_slot = match entry.task_type {
            TaskType::Fixed => entry.fixed_slot.clone(),
            TaskType::Flexible => None,
        };
        task.dependency = entry.depends_on.clone();
        task.deadline_offset = entry.deadline_offset_days;
        task.notes = entry.notes.clone();
        task.status = if entry.depends_on.is_some() {
            TaskStatus::Blocked
        } else {
            TaskStatus::Pending
        };

        TaskRepository::insert(conn, &task)?;
        Ok(true)
    }
}

/// `1_learn_english.json` → 1. Lower N = higher priority.
fn numeric_prefix(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let (prefix, _) = name.split_once('_')?;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

fn file_priority_for(prefix: i64) -> i64 {
    120 - prefix * 10
}
