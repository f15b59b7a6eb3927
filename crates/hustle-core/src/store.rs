use crate::quarter::Week;
use crate::task::{GoalId, Task, TaskDraft, TaskId};

/// Read-only access to the quarter label stored on a goal.
pub trait QuarterLookup {
    fn quarter_for_goal(&self, goal_id: &GoalId) -> Option<String>;
}

/// The task collaborator the board reads from. Every mutation must be
/// visible in full to the next `tasks_for_goal` call.
pub trait TaskStore {
    fn tasks_for_goal(&self, goal_id: &GoalId) -> anyhow::Result<Vec<Task>>;

    fn add_task(&self, goal_id: &GoalId, draft: TaskDraft) -> anyhow::Result<Task>;

    fn edit_task(
        &self,
        id: &TaskId,
        title: &str,
        is_recurring: bool,
        week: Option<Week>,
    ) -> anyhow::Result<Task>;

    fn delete_task(&self, id: &TaskId) -> anyhow::Result<()>;

    /// Flips completion. `completed_in` is recorded as the week of a
    /// recurring task when it becomes complete.
    fn toggle_completion(&self, id: &TaskId, completed_in: Option<Week>) -> anyhow::Result<Task>;
}
