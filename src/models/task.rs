use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "MISSED")]
    Missed,
    #[serde(rename = "BLOCKED")]
    Blocked,
    #[serde(rename = "DONE")]
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::Missed => "MISSED",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "PENDING" => Ok(TaskStatus::Pending),
            "SCHEDULED" => Ok(TaskStatus::Scheduled),
            "MISSED" => Ok(TaskStatus::Missed),
            "BLOCKED" => Ok(TaskStatus::Blocked),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(AppError::validation(format!("unknown task status: {other}"))),
        }
    }
}

/// Energy levels shared by task requirements and slot supplies.
/// The rank mapping drives the optimizer's energy bonus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    Any,
}

impl EnergyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EnergyLevel::Low => "Low",
            EnergyLevel::Medium => "Medium",
            EnergyLevel::High => "High",
            EnergyLevel::Any => "Any",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "Low" => Ok(EnergyLevel::Low),
            "Medium" => Ok(EnergyLevel::Medium),
            "High" => Ok(EnergyLevel::High),
            "Any" => Ok(EnergyLevel::Any),
            other => Err(AppError::validation(format!("unknown energy level: {other}"))),
        }
    }

    /// Low=1, Medium=2, High=3; Any is treated as Medium.
    pub fn rank(self) -> i64 {
        match self {
            EnergyLevel::Low => 1,
            EnergyLevel::Medium | EnergyLevel::Any => 2,
            EnergyLevel::High => 3,
        }
    }
}

impl Default for EnergyLevel {
    fn default() -> Self {
        EnergyLevel::Medium
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskType {
    Flexible,
    Fixed,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Flexible => "Flexible",
            TaskType::Fixed => "Fixed",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "Flexible" => Ok(TaskType::Flexible),
            "Fixed" => Ok(TaskType::Fixed),
            other => Err(AppError::validation(format!("unknown task type: {other}"))),
        }
    }
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Flexible
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: TaskStatus,
    pub category: String,
    pub priority: i64,
    pub duration: i64,
    pub actual_duration: Option<i64>,
    pub energy_req: EnergyLevel,
    pub task_type: TaskType,
    pub fixed_slot: Option<String>,
    pub dependency: Option<String>,
    pub deadline_offset: i64,
    pub notes: String,
    pub scheduled_start: Option<String>,
    pub calendar_event_id: Option<String>,
    pub idempotency_key: String,
    pub is_soft_deleted: bool,
    pub created_at: String,
}

impl TaskRecord {
    /// A pending flexible task with field defaults; callers override the
    /// fields their document supplies.
    pub fn new(project_id: impl Into<String>, name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            category: "General".to_string(),
            priority: 1,
            duration: 60,
            actual_duration: None,
            energy_req: EnergyLevel::default(),
            task_type: TaskType::default(),
            fixed_slot: None,
            dependency: None,
            deadline_offset: 0,
            notes: String::new(),
            scheduled_start: None,
            calendar_event_id: None,
            idempotency_key: Uuid::new_v4().to_string(),
            is_soft_deleted: false,
            created_at: created_at.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub task_id: String,
    pub action: String,
    pub planned_start: Option<String>,
    pub actual_start: Option<String>,
}
