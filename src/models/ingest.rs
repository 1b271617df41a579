use serde::{Deserialize, Serialize};

use crate::models::task::{EnergyLevel, TaskType};

/// One input document from `data/inputs/*.json`: a project (course) and its
/// tasks. All keys are optional except task names; defaults mirror what the
/// planner assumes downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectDocument {
    pub project_name: String,
    #[serde(alias = "category")]
    pub default_category: Option<String>,
    pub priority: Option<i64>,
    pub color: Option<String>,
    pub tags: Vec<String>,
    pub reality_factor: f64,
    pub tasks: Vec<TaskEntry>,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            project_name: "General Project".to_string(),
            default_category: None,
            priority: None,
            color: None,
            tags: Vec::new(),
            reality_factor: 1.0,
            tasks: Vec::new(),
        }
    }
}

impl ProjectDocument {
    pub fn category(&self) -> String {
        self.default_category
            .clone()
            .unwrap_or_else(|| "General".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEntry {
    pub name: String,
    #[serde(default = "default_duration")]
    pub duration: i64,
    #[serde(default)]
    pub energy: EnergyLevel,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub fixed_slot: Option<String>,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub deadline_offset_days: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

fn default_duration() -> i64 {
    60
}
