use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::template::{DaySchedule, Slot, TemplateBlock, WeekTemplate};
use crate::services::time_service::TimeUtil;

/// Expands the weekly template into concrete dated slots, partitioned into
/// optimizer candidates (free) and fixed personal time (constant).
pub struct TemplateExpander;

impl TemplateExpander {
    pub fn load_template(path: &Path) -> AppResult<WeekTemplate> {
        if !path.exists() {
            return Err(AppError::config(format!(
                "week template not found at {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|err| AppError::config(format!("{}: {err}", path.display())))
    }

    pub fn expand(
        template: &WeekTemplate,
        start: NaiveDate,
        days_ahead: u32,
    ) -> AppResult<(Vec<Slot>, Vec<Slot>)> {
        let active_schedule = template.modes.get(&template.current_mode).ok_or_else(|| {
            AppError::config(format!("unknown template mode: {}", template.current_mode))
        })?;

        let mut free_slots = Vec::new();
        let mut constant_blocks = Vec::new();

        for offset in 0..days_ahead {
            let date = start + Duration::days(offset as i64);
            let day_name = date.format("%A").to_string();

            let mut entry = active_schedule.get(&day_name);
            if let Some(DaySchedule::Reference(target)) = entry {
                // Single hop only; a reference to a reference resolves to nothing.
                entry = active_schedule.get(target);
                if matches!(entry, Some(DaySchedule::Reference(_))) {
                    warn!(
                        target: "app::template",
                        day = %day_name,
                        reference = %target,
                        "transitive day reference ignored"
                    );
                    entry = None;
                }
            }

            let blocks = match entry {
                Some(DaySchedule::Blocks(blocks)) => blocks,
                _ => continue,
            };

            let mut daily_items = Vec::new();
            for block in blocks {
                match Self::materialize(block, date) {
                    Ok(slot) => daily_items.push(slot),
                    Err(err) => {
                        warn!(
                            target: "app::template",
                            day = %day_name,
                            error = %err,
                            "skipping malformed template block"
                        );
                    }
                }
            }

            // Constant blocks reserve their time first; frees are admitted
            // against that mask. At most one block per exact start per day.
            let mut seen_starts: HashSet<NaiveDateTime> = HashSet::new();
            let mut occupied: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();

            for slot in daily_items.iter().filter(|slot| slot.is_constant()) {
                if !seen_starts.insert(slot.start) {
                    continue;
                }
                occupied.push((slot.start, slot.end));
                if slot.end.date() > slot.start.date() {
                    // The template repeats daily: a block wrapping past
                    // midnight also covers this day's early hours.
                    let day_start = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
                    let wrapped_end = day_start + (slot.end - (day_start + Duration::days(1)));
                    occupied.push((day_start, wrapped_end));
                }
                constant_blocks.push(slot.clone());
            }

            for slot in daily_items.iter().filter(|slot| !slot.is_constant()) {
                if seen_starts.contains(&slot.start) {
                    continue;
                }
                let masked = occupied
                    .iter()
                    .any(|(occ_start, occ_end)| slot.start < *occ_end && slot.end > *occ_start);
                if masked {
                    debug!(
                        target: "app::template",
                        label = %slot.label,
                        start = %slot.start,
                        "free slot masked by constant block"
                    );
                    continue;
                }
                seen_starts.insert(slot.start);
                free_slots.push(slot.clone());
            }
        }

        free_slots.sort_by_key(|slot| slot.start);
        constant_blocks.sort_by_key(|slot| slot.start);

        Ok((free_slots, constant_blocks))
    }

    fn materialize(block: &TemplateBlock, date: NaiveDate) -> AppResult<Slot> {
        let (start_hour, start_minute) = TimeUtil::parse_clock(&block.start)?;
        let (end_hour, end_minute) = TimeUtil::parse_clock(&block.end)?;

        let start = date
            .and_hms_opt(start_hour, start_minute, 0)
            .ok_or_else(|| AppError::validation(format!("invalid block start: {}", block.start)))?;
        let mut end = date
            .and_hms_opt(end_hour, end_minute, 0)
            .ok_or_else(|| AppError::validation(format!("invalid block end: {}", block.end)))?;

        if end < start {
            end += Duration::days(1);
        }

        Ok(Slot {
            start,
            end,
            duration: (end - start).num_minutes(),
            category: block.category.clone(),
            label: block
                .label
                .clone()
                .unwrap_or_else(|| block.category.clone()),
            energy_supply: block.energy_supply.unwrap_or_default(),
            notes: block.notes.clone().unwrap_or_default(),
        })
    }
}
