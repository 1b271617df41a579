use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use crate::models::task::{EnergyLevel, TaskRecord, TaskType};
use crate::models::template::{Slot, FREE_CATEGORY};

/// Lecture-style categories stay off Saturday and Sunday.
const WEEKEND_GUARDED: [&str; 2] = ["Study", "Learn"];

const BASE_SCORE: i64 = 10_000;
const PRIORITY_WEIGHT: i64 = 5_000;
const SLOT_INDEX_PENALTY: i64 = 10;

/// Optimizer view of a task. `sequence` carries (group, order) when the
/// caller wants tasks of one group placed in slot-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverTask {
    pub id: String,
    pub name: String,
    pub category: String,
    pub priority: i64,
    pub duration: i64,
    pub energy_req: EnergyLevel,
    pub task_type: TaskType,
    pub fixed_slot: Option<String>,
    pub sequence: Option<(i64, i64)>,
}

impl SolverTask {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            priority: record.priority,
            duration: record.duration,
            energy_req: record.energy_req,
            task_type: record.task_type,
            fixed_slot: record.fixed_slot.clone(),
            sequence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub task_id: String,
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub energy_supply: EnergyLevel,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    slot_index: usize,
    weight: i64,
}

/// Assigns tasks to free slots: hard filters cut the (task, slot) pairs,
/// then a branch-and-bound search maximizes the weighted objective under
/// no-overlap and sequence constraints. Infeasibility is not an error;
/// unplaced tasks simply stay pending.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
    node_budget: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            node_budget: 200_000,
        }
    }

    pub fn with_node_budget(node_budget: usize) -> Self {
        Self { node_budget }
    }

    pub fn solve(&self, tasks: &[SolverTask], slots: &[Slot]) -> Vec<Assignment> {
        if tasks.is_empty() || slots.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<Vec<Candidate>> = tasks
            .iter()
            .map(|task| admitted_candidates(task, slots))
            .collect();

        debug!(
            target: "app::solver",
            tasks = tasks.len(),
            slots = slots.len(),
            pairs = candidates.iter().map(Vec::len).sum::<usize>(),
            "solving assignment"
        );

        // Admissible bound: the best candidate of every remaining task.
        let mut suffix_bound = vec![0i64; tasks.len() + 1];
        for index in (0..tasks.len()).rev() {
            let best = candidates[index]
                .iter()
                .map(|candidate| candidate.weight.max(0))
                .max()
                .unwrap_or(0);
            suffix_bound[index] = suffix_bound[index + 1] + best;
        }

        let mut search = Search {
            tasks,
            slots,
            candidates: &candidates,
            suffix_bound,
            assignment: vec![None; tasks.len()],
            best: vec![None; tasks.len()],
            score: 0,
            best_score: 0,
            nodes_left: self.node_budget,
        };
        search.explore(0);

        if search.nodes_left == 0 {
            warn!(
                target: "app::solver",
                budget = self.node_budget,
                "search budget exhausted, returning best assignment found"
            );
        }

        let mut assignments: Vec<Assignment> = search
            .best
            .iter()
            .enumerate()
            .filter_map(|(task_index, chosen)| {
                chosen.map(|slot_index| {
                    let task = &tasks[task_index];
                    let slot = &slots[slot_index];
                    Assignment {
                        task_id: task.id.clone(),
                        name: task.name.clone(),
                        start: slot.start,
                        end: slot.start + Duration::minutes(task.duration),
                        energy_supply: slot.energy_supply,
                    }
                })
            })
            .collect();
        assignments.sort_by_key(|assignment| assignment.start);

        debug!(
            target: "app::solver",
            assigned = assignments.len(),
            score = search.best_score,
            "assignment complete"
        );

        assignments
    }
}

fn admitted_candidates(task: &SolverTask, slots: &[Slot]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = slots
        .iter()
        .enumerate()
        .filter_map(|(slot_index, slot)| {
            if slot.duration < task.duration {
                return None;
            }
            match task.task_type {
                TaskType::Fixed => {
                    if task.fixed_slot.as_deref() != Some(slot.start_clock().as_str()) {
                        return None;
                    }
                }
                TaskType::Flexible => {
                    if slot.category != FREE_CATEGORY && slot.category != task.category {
                        return None;
                    }
                }
            }
            if slot.is_weekend() && WEEKEND_GUARDED.contains(&task.category.as_str()) {
                return None;
            }
            Some(Candidate {
                slot_index,
                weight: pair_weight(task, slot_index, slot),
            })
        })
        .collect();

    // Best pairs first so the greedy-leading branch is explored first;
    // ties fall back to the earlier slot.
    candidates.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.slot_index.cmp(&b.slot_index)));
    candidates
}

fn pair_weight(task: &SolverTask, slot_index: usize, slot: &Slot) -> i64 {
    let mut score = BASE_SCORE + task.priority * PRIORITY_WEIGHT;

    let required = task.energy_req.rank();
    let supplied = slot.energy_supply.rank();
    score += if required == supplied {
        500
    } else if required > supplied {
        -1_000
    } else {
        100
    };

    score - SLOT_INDEX_PENALTY * slot_index as i64
}

struct Search<'a> {
    tasks: &'a [SolverTask],
    slots: &'a [Slot],
    candidates: &'a [Vec<Candidate>],
    suffix_bound: Vec<i64>,
    assignment: Vec<Option<usize>>,
    best: Vec<Option<usize>>,
    score: i64,
    best_score: i64,
    nodes_left: usize,
}

impl Search<'_> {
    fn explore(&mut self, task_index: usize) {
        if self.nodes_left == 0 {
            return;
        }
        self.nodes_left -= 1;

        if task_index == self.tasks.len() {
            if self.score > self.best_score {
                self.best_score = self.score;
                self.best.clone_from(&self.assignment);
            }
            return;
        }

        if self.score + self.suffix_bound[task_index] <= self.best_score {
            return;
        }

        for candidate_index in 0..self.candidates[task_index].len() {
            let candidate = self.candidates[task_index][candidate_index];
            if !self.is_feasible(task_index, candidate.slot_index) {
                continue;
            }
            self.assignment[task_index] = Some(candidate.slot_index);
            self.score += candidate.weight;
            self.explore(task_index + 1);
            self.score -= candidate.weight;
            self.assignment[task_index] = None;
        }

        // Assignment is optional: the task may stay pending.
        self.explore(task_index + 1);
    }

    fn is_feasible(&self, task_index: usize, slot_index: usize) -> bool {
        let task = &self.tasks[task_index];
        let start = self.slots[slot_index].start;
        let end = start + Duration::minutes(task.duration);

        for (other_index, chosen) in self.assignment[..task_index].iter().enumerate() {
            let Some(other_slot) = chosen else { continue };
            let other = &self.tasks[other_index];
            let other_start = self.slots[*other_slot].start;
            let other_end = other_start + Duration::minutes(other.duration);

            if start < other_end && end > other_start {
                return false;
            }

            if let (Some((other_group, other_order)), Some((group, order))) =
                (other.sequence, task.sequence)
            {
                if other_group == group {
                    if other_order < order && *other_slot >= slot_index {
                        return false;
                    }
                    if other_order > order && *other_slot <= slot_index {
                        return false;
                    }
                }
            }
        }

        true
    }
}
