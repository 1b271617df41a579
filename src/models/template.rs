use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::task::EnergyLevel;

/// Blocks with this category are fixed personal time (sleep, meals, gym):
/// written straight to the calendar, never handed to the optimizer.
pub const CONSTANT_CATEGORY: &str = "Constant";

/// Slot category that accepts any flexible task.
pub const FREE_CATEGORY: &str = "Free";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekTemplate {
    pub current_mode: String,
    #[serde(default)]
    pub modes: BTreeMap<String, BTreeMap<String, DaySchedule>>,
}

/// A weekday entry is either its own block list or the name of another
/// weekday whose blocks it reuses (resolved with a single hop).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DaySchedule {
    Blocks(Vec<TemplateBlock>),
    Reference(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateBlock {
    pub start: String,
    pub end: String,
    #[serde(default = "default_block_category")]
    pub category: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub energy_supply: Option<EnergyLevel>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_block_category() -> String {
    "General".to_string()
}

/// A template block joined with a concrete date. Transient: produced by the
/// expander, consumed within a single plan run, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration: i64,
    pub category: String,
    pub label: String,
    pub energy_supply: EnergyLevel,
    pub notes: String,
}

impl Slot {
    pub fn is_constant(&self) -> bool {
        self.category == CONSTANT_CATEGORY
    }

    pub fn start_clock(&self) -> String {
        self.start.format("%H:%M").to_string()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.start.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
