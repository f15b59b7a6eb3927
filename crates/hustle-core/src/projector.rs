use tracing::{debug, trace};

use crate::quarter::Week;
use crate::task::{Task, TaskId};

/// A task viewed in one concrete week. Completion belongs to the task, so
/// every instance of a recurring task reports the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInstance<'a> {
    pub task: &'a Task,
    pub week: Week,
}

impl<'a> TaskInstance<'a> {
    pub fn id(&self) -> &'a TaskId {
        &self.task.id
    }

    pub fn title(&self) -> &'a str {
        &self.task.title
    }

    pub fn completed(&self) -> bool {
        self.task.completed
    }

    pub fn is_recurring(&self) -> bool {
        self.task.is_recurring
    }
}

/// Weeks a task occupies.
///
/// A one-time task sits in its own week and is dropped when it has none. An
/// open recurring task is due every week. A completed recurring task
/// collapses to the week its completion was recorded in, or week 1.
pub fn weeks_for(task: &Task) -> Vec<Week> {
    match (task.is_recurring, task.completed) {
        (false, _) => match task.week {
            Some(week) => vec![week],
            None => {
                debug!(task = %task.id, "one-time task has no valid week; dropping it");
                vec![]
            }
        },
        (true, false) => Week::all().collect(),
        (true, true) => vec![task.week.unwrap_or(Week::FIRST)],
    }
}

pub fn project(task: &Task) -> Vec<TaskInstance<'_>> {
    let instances: Vec<_> = weeks_for(task)
        .into_iter()
        .map(|week| TaskInstance { task, week })
        .collect();
    trace!(task = %task.id, count = instances.len(), "projected task");
    instances
}
