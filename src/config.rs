use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppResult;

/// What happens to a SCHEDULED task whose calendar event disappeared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissedTaskPolicy {
    /// Mark MISSED and soft-delete; recovery requires re-ingestion.
    SoftDelete,
    /// Put the task back into the PENDING backlog for the next plan run.
    Requeue,
}

impl Default for MissedTaskPolicy {
    fn default() -> Self {
        MissedTaskPolicy::SoftDelete
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub task_db_file: PathBuf,
    pub calendar_db_file: PathBuf,
    /// Wall-clock offset applied when persisting to the calendar store.
    pub utc_offset_minutes: i64,
    pub lookahead_days: u32,
    pub limit_per_subject: usize,
    /// Past this local hour, planning starts tomorrow.
    pub late_start_hour: u32,
    /// Budget for one pipeline run, checked between planner days.
    pub max_run_seconds: u64,
    pub missed_task_policy: MissedTaskPolicy,
    pub feed_name: String,
    pub http_port: u16,
    pub watch_inputs: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            task_db_file: PathBuf::from("db/vibe_core.sqlite"),
            calendar_db_file: PathBuf::from("db/calendar.sqlite"),
            utc_offset_minutes: 330,
            lookahead_days: 15,
            limit_per_subject: 1,
            late_start_hour: 20,
            max_run_seconds: 300,
            missed_task_policy: MissedTaskPolicy::default(),
            feed_name: "VibeOS".to_string(),
            http_port: 8000,
            watch_inputs: true,
        }
    }
}

impl PipelineConfig {
    /// Loads `data/config/pipeline.json` relative to `base_dir`, falling back
    /// to defaults when the file is absent. A malformed file is an error:
    /// silently ignoring it would plan with the wrong offset or paths.
    pub fn load(base_dir: &Path) -> AppResult<Self> {
        let path = base_dir.join("data").join("config").join("pipeline.json");
        if !path.exists() {
            info!(target: "app::config", path = %path.display(), "no pipeline config, using defaults");
            let mut config = Self::default();
            config.data_dir = base_dir.join("data");
            return Ok(config);
        }

        let raw = fs::read_to_string(&path)?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|err| crate::error::AppError::config(format!("{}: {err}", path.display())))?;
        if config.data_dir.is_relative() {
            config.data_dir = base_dir.join(&config.data_dir);
        }
        info!(target: "app::config", path = %path.display(), "pipeline config loaded");
        Ok(config)
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.data_dir.join("inputs")
    }

    pub fn template_path(&self) -> PathBuf {
        self.data_dir.join("config").join("week_template.json")
    }

    pub fn task_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.task_db_file)
    }

    pub fn calendar_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.calendar_db_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_dirs(&self) -> AppResult<()> {
        for dir in [self.inputs_dir(), self.data_dir.join("config"), self.log_dir()] {
            if !dir.exists() {
                warn!(target: "app::config", dir = %dir.display(), "creating missing directory");
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
