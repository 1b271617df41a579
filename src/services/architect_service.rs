use std::collections::HashMap;

use tracing::debug;

use crate::models::task::TaskRecord;

/// Selects a balanced daily batch from the pending backlog: at most
/// `limit_per_subject` tasks per subject per day, so one subject cannot
/// swallow a whole day ("drip feed"). Input order (priority desc, created_at
/// asc) is preserved in both outputs, so the first task carrying a subject
/// key wins the day.
#[derive(Debug, Clone, Copy)]
pub struct Architect {
    limit_per_subject: usize,
}

impl Architect {
    pub fn new(limit_per_subject: usize) -> Self {
        Self { limit_per_subject }
    }

    pub fn balanced_batch(&self, pendings: Vec<TaskRecord>) -> (Vec<TaskRecord>, Vec<TaskRecord>) {
        let mut used: HashMap<String, usize> = HashMap::new();
        let mut batch = Vec::new();
        let mut deferred = Vec::new();

        for task in pendings {
            let key = subject_key(&task);
            let count = used.entry(key).or_insert(0);
            if *count < self.limit_per_subject {
                *count += 1;
                batch.push(task);
            } else {
                deferred.push(task);
            }
        }

        debug!(
            target: "app::architect",
            batch = batch.len(),
            deferred = deferred.len(),
            "balanced batch selected"
        );

        (batch, deferred)
    }
}

/// Subject key: category plus the first word of the task name, so
/// "Chemistry: Ch 1" and "Chemistry: Ch 2" count as the same subject.
fn subject_key(task: &TaskRecord) -> String {
    let first_word = task.name.split_whitespace().next().unwrap_or("");
    format!("{}_{}", task.category, first_word)
}
