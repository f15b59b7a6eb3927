use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::quarter::Week;
use crate::store::{QuarterLookup, TaskStore};
use crate::task::{Goal, GoalId, Task, TaskDraft, TaskId, TaskRecord};
use crate::visibility::{VisibilityRecord, VisibilityState};

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub goals_path: PathBuf,
    pub visibility_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let goals_path = data_dir.join("goals.data");
        let visibility_path = data_dir.join("visibility.data");

        for path in [&tasks_path, &goals_path, &visibility_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            goals = %goals_path.display(),
            visibility = %visibility_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            goals_path,
            visibility_path,
        })
    }

    /// Every usable task in the store. Records that fail validation are
    /// skipped with a warning; lines that are not JSON are an error.
    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let records = self.load_task_records()?;

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            match Task::try_from(record) {
                Ok(task) => tasks.push(task),
                Err(err) => warn!(error = %err, "skipping invalid task record"),
            }
        }
        Ok(tasks)
    }

    /// Raw records, including ones that would not validate. Writes go
    /// through these so partial records are carried along untouched.
    pub fn load_task_records(&self) -> anyhow::Result<Vec<TaskRecord>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, records))]
    fn save_task_records(&self, records: &[TaskRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, records).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_goals(&self) -> anyhow::Result<Vec<Goal>> {
        load_jsonl(&self.goals_path).context("failed to load goals.data")
    }

    #[tracing::instrument(skip(self, goals))]
    pub fn save_goals(&self, goals: &[Goal]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.goals_path, goals).context("failed to save goals.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn add_goal(&self, title: &str, quarter: Option<String>) -> anyhow::Result<Goal> {
        if title.trim().is_empty() {
            return Err(anyhow!("goal title cannot be empty"));
        }

        let mut goals = self.load_goals()?;
        let goal = Goal::new(title, quarter);
        goals.push(goal.clone());
        self.save_goals(&goals)?;

        info!(goal = %goal.id, quarter = ?goal.quarter, "goal added");
        Ok(goal)
    }

    /// Resolves a full goal id or a unique prefix of one.
    pub fn find_goal(&self, needle: &str) -> anyhow::Result<Goal> {
        let goals = self.load_goals()?;
        let found = find_unique(&goals, needle, |goal| goal.id.as_str())?;
        Ok(found.clone())
    }

    /// Resolves a full task id or a unique prefix of one.
    pub fn find_task(&self, needle: &str) -> anyhow::Result<Task> {
        let tasks = self.load_tasks()?;
        let found = find_unique(&tasks, needle, |task| task.id.as_str())?;
        Ok(found.clone())
    }

    #[tracing::instrument(skip(self), fields(goal = %goal_id))]
    pub fn load_visibility(
        &self,
        goal_id: &GoalId,
        show_all_weeks_default: bool,
    ) -> anyhow::Result<VisibilityState> {
        let records: Vec<VisibilityRecord> =
            load_jsonl(&self.visibility_path).context("failed to load visibility.data")?;

        let state = records
            .iter()
            .find(|record| &record.goal_id == goal_id)
            .map(VisibilityState::from_record)
            .unwrap_or_else(|| VisibilityState::new(show_all_weeks_default));
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(goal = %goal_id))]
    pub fn save_visibility(&self, goal_id: &GoalId, state: &VisibilityState) -> anyhow::Result<()> {
        let mut records: Vec<VisibilityRecord> =
            load_jsonl(&self.visibility_path).context("failed to load visibility.data")?;
        records.retain(|record| &record.goal_id != goal_id);
        records.push(state.to_record(goal_id));
        save_jsonl_atomic(&self.visibility_path, &records)
            .context("failed to save visibility.data")
    }

    fn update_task<F>(&self, id: &TaskId, apply: F) -> anyhow::Result<Task>
    where
        F: FnOnce(&mut Task) -> anyhow::Result<()>,
    {
        let mut records = self.load_task_records()?;
        let slot = records
            .iter_mut()
            .find(|record| record.id == id.as_str())
            .ok_or_else(|| anyhow!("task not found: {id}"))?;
        let mut task =
            Task::try_from(slot.clone()).with_context(|| format!("task {id} is not usable"))?;
        apply(&mut task)?;
        *slot = TaskRecord::from(&task);
        self.save_task_records(&records)?;
        Ok(task)
    }
}

impl QuarterLookup for DataStore {
    fn quarter_for_goal(&self, goal_id: &GoalId) -> Option<String> {
        let goals = match self.load_goals() {
            Ok(goals) => goals,
            Err(err) => {
                warn!(goal = %goal_id, error = %err, "quarter lookup failed");
                return None;
            }
        };
        goals
            .into_iter()
            .find(|goal| &goal.id == goal_id)
            .and_then(|goal| goal.quarter)
    }
}

impl TaskStore for DataStore {
    #[tracing::instrument(skip(self), fields(goal = %goal_id))]
    fn tasks_for_goal(&self, goal_id: &GoalId) -> anyhow::Result<Vec<Task>> {
        let tasks: Vec<Task> = self
            .load_tasks()?
            .into_iter()
            .filter(|task| &task.goal_id == goal_id)
            .collect();
        debug!(count = tasks.len(), "loaded tasks for goal");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, draft), fields(goal = %goal_id))]
    fn add_task(&self, goal_id: &GoalId, draft: TaskDraft) -> anyhow::Result<Task> {
        let task = draft.into_task(goal_id.clone())?;
        let mut records = self.load_task_records()?;
        records.push(TaskRecord::from(&task));
        self.save_task_records(&records)?;
        info!(task = %task.id, recurring = task.is_recurring, "task added");
        Ok(task)
    }

    #[tracing::instrument(skip(self, title), fields(task = %id))]
    fn edit_task(
        &self,
        id: &TaskId,
        title: &str,
        is_recurring: bool,
        week: Option<Week>,
    ) -> anyhow::Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(anyhow!("task title cannot be empty"));
        }
        if !is_recurring && week.is_none() {
            return Err(anyhow!("a one-time task needs a week"));
        }

        self.update_task(id, |task| {
            task.title = title.to_string();
            task.is_recurring = is_recurring;
            task.week = if is_recurring { None } else { week };
            Ok(())
        })
    }

    #[tracing::instrument(skip(self), fields(task = %id))]
    fn delete_task(&self, id: &TaskId) -> anyhow::Result<()> {
        let mut records = self.load_task_records()?;
        let before = records.len();
        records.retain(|record| record.id != id.as_str());
        if records.len() == before {
            return Err(anyhow!("task not found: {id}"));
        }
        self.save_task_records(&records)?;
        info!("task deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(task = %id))]
    fn toggle_completion(&self, id: &TaskId, completed_in: Option<Week>) -> anyhow::Result<Task> {
        let task = self.update_task(id, |task| {
            task.completed = !task.completed;
            if task.is_recurring {
                task.week = if task.completed { completed_in } else { None };
            }
            Ok(())
        })?;
        info!(
            completed = task.completed,
            week = ?task.week.map(Week::number),
            "task completion toggled"
        );
        Ok(task)
    }
}

fn find_unique<'a, T>(
    items: &'a [T],
    needle: &str,
    id_of: impl Fn(&T) -> &str,
) -> anyhow::Result<&'a T> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(anyhow!("id cannot be empty"));
    }
    if let Some(exact) = items.iter().find(|item| id_of(*item) == needle) {
        return Ok(exact);
    }

    let mut matches = items.iter().filter(|item| id_of(*item).starts_with(needle));
    let first = matches.next().ok_or_else(|| anyhow!("no match for id: {needle}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous id prefix: {needle}"));
    }
    Ok(first)
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
