use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::quarter::Week;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(String);

macro_rules! opaque_id {
    ($name:ident) => {
        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(TaskId);
opaque_id!(GoalId);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidTask {
    #[error("task id is empty")]
    EmptyId,
    #[error("task {0} has an empty title")]
    EmptyTitle(TaskId),
    #[error("task {0} does not belong to a goal")]
    MissingGoal(TaskId),
    #[error("one-time task {0} needs a week between 1 and 12")]
    MissingWeek(TaskId),
}

/// A unit of work belonging to a goal.
///
/// `week` is the fixed week of a one-time task. For a recurring task it is
/// only set once the task has been completed, and marks the week the
/// completion was recorded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub goal_id: GoalId,
    pub title: String,
    pub completed: bool,
    pub is_recurring: bool,
    pub week: Option<Week>,
}

impl Task {
    pub fn one_time(goal_id: GoalId, title: &str, week: Week) -> Self {
        Self {
            id: TaskId::generate(),
            goal_id,
            title: title.trim().to_string(),
            completed: false,
            is_recurring: false,
            week: Some(week),
        }
    }

    pub fn recurring(goal_id: GoalId, title: &str) -> Self {
        Self {
            id: TaskId::generate(),
            goal_id,
            title: title.trim().to_string(),
            completed: false,
            is_recurring: true,
            week: None,
        }
    }

    pub fn schedule_label(&self) -> String {
        if self.is_recurring {
            "Recurring Weekly".to_string()
        } else {
            match self.week {
                Some(week) => week.to_string(),
                None => "Week ?".to_string(),
            }
        }
    }
}

/// What a caller supplies to create a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub is_recurring: bool,
    pub week: Option<Week>,
}

impl TaskDraft {
    pub fn into_task(self, goal_id: GoalId) -> Result<Task, InvalidTask> {
        let id = TaskId::generate();
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(InvalidTask::EmptyTitle(id));
        }
        if self.is_recurring {
            return Ok(Task {
                id,
                goal_id,
                title,
                completed: false,
                is_recurring: true,
                week: None,
            });
        }
        let Some(week) = self.week else {
            return Err(InvalidTask::MissingWeek(id));
        };
        Ok(Task {
            id,
            goal_id,
            title,
            completed: false,
            is_recurring: false,
            week: Some(week),
        })
    }
}

/// On-disk task shape. Loosely typed so partially edited records survive a
/// load; [`Task::try_from`] decides what is usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub goal_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<i64>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = InvalidTask;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        if record.id.trim().is_empty() {
            return Err(InvalidTask::EmptyId);
        }
        let id = TaskId::from(record.id);
        if record.title.trim().is_empty() {
            return Err(InvalidTask::EmptyTitle(id));
        }
        if record.goal_id.trim().is_empty() {
            return Err(InvalidTask::MissingGoal(id));
        }

        let week = record.week.and_then(|raw| {
            let week = Week::from_i64(raw);
            if week.is_none() {
                warn!(task = %id, week = raw, "task week out of range; ignoring it");
            }
            week
        });

        Ok(Self {
            id,
            goal_id: GoalId::from(record.goal_id),
            title: record.title,
            completed: record.completed,
            is_recurring: record.is_recurring,
            week,
        })
    }
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            goal_id: task.goal_id.to_string(),
            title: task.title.clone(),
            completed: task.completed,
            is_recurring: task.is_recurring,
            week: task.week.map(|week| i64::from(week.number())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    #[serde(default)]
    pub quarter: Option<String>,
}

impl Goal {
    pub fn new(title: &str, quarter: Option<String>) -> Self {
        Self {
            id: GoalId::generate(),
            title: title.trim().to_string(),
            quarter,
        }
    }
}
