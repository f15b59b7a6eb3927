use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::board::group_and_filter;
use crate::cli::{
    Command, GoalCommand, ScheduleArgs, ScheduleChange, TaskCommand, ViewCommand,
};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::quarter::{Quarter, Week, current_week_for_goal};
use crate::render::{BoardContext, Renderer};
use crate::store::TaskStore;
use crate::task::{Goal, TaskDraft};

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    today: NaiveDate,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Goal(GoalCommand::Add { title, quarter }) => {
            cmd_goal_add(store, &title, quarter, today)
        }
        Command::Goal(GoalCommand::List) => cmd_goal_list(store, renderer, today),
        Command::Task(TaskCommand::Add {
            goal,
            title,
            schedule,
        }) => cmd_task_add(store, &goal, &title.join(" "), &schedule),
        Command::Task(TaskCommand::Edit {
            task,
            title,
            schedule,
        }) => cmd_task_edit(store, &task, title.as_deref(), &schedule),
        Command::Task(TaskCommand::Toggle { task }) => cmd_task_toggle(store, &task, today),
        Command::Task(TaskCommand::Delete { task }) => cmd_task_delete(store, &task),
        Command::Board { goal, all_weeks } => {
            cmd_board(store, cfg, renderer, &goal, all_weeks, today)
        }
        Command::View(ViewCommand::AllWeeks { goal }) => cmd_view_all_weeks(store, cfg, &goal),
        Command::View(ViewCommand::Completed { goal, week }) => {
            cmd_view_completed(store, cfg, &goal, week)
        }
        Command::Config => cmd_config(cfg),
    }
}

#[instrument(skip(store, today))]
fn cmd_goal_add(
    store: &DataStore,
    title: &str,
    quarter: Option<Quarter>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command goal add");

    let quarter = quarter.unwrap_or_else(|| Quarter::containing(today));
    let goal = store.add_goal(title, Some(quarter.to_string()))?;
    println!("Created goal {} for {}.", goal.id, quarter.title());
    Ok(())
}

#[instrument(skip(store, renderer, today))]
fn cmd_goal_list(store: &DataStore, renderer: &Renderer, today: NaiveDate) -> anyhow::Result<()> {
    info!("command goal list");

    let goals: Vec<(Goal, Option<Week>)> = store
        .load_goals()?
        .into_iter()
        .map(|goal| {
            let current = current_week_for_goal(store, &goal.id, today);
            (goal, current)
        })
        .collect();

    if goals.is_empty() {
        println!("No goals yet.");
        return Ok(());
    }
    renderer.print_goals(&goals)
}

#[instrument(skip(store, schedule))]
fn cmd_task_add(
    store: &DataStore,
    goal: &str,
    title: &str,
    schedule: &ScheduleArgs,
) -> anyhow::Result<()> {
    info!("command task add");

    let goal = store.find_goal(goal)?;
    let draft = TaskDraft {
        title: title.to_string(),
        is_recurring: schedule.recurring,
        week: schedule.week,
    };
    let task = store.add_task(&goal.id, draft)?;
    println!("Created task {} ({}).", task.id, task.schedule_label());
    Ok(())
}

#[instrument(skip(store, schedule))]
fn cmd_task_edit(
    store: &DataStore,
    task: &str,
    title: Option<&str>,
    schedule: &ScheduleChange,
) -> anyhow::Result<()> {
    info!("command task edit");

    let existing = store.find_task(task)?;
    let title = title.unwrap_or(&existing.title);
    let (is_recurring, week) = schedule.resolve(&existing);
    let task = store.edit_task(&existing.id, title, is_recurring, week)?;
    println!("Updated task {} ({}).", task.id, task.schedule_label());
    Ok(())
}

#[instrument(skip(store, today))]
fn cmd_task_toggle(store: &DataStore, task: &str, today: NaiveDate) -> anyhow::Result<()> {
    info!("command task toggle");

    let existing = store.find_task(task)?;
    let completed_in = current_week_for_goal(store, &existing.goal_id, today);
    let task = store.toggle_completion(&existing.id, completed_in)?;

    let state = if task.completed { "done" } else { "open" };
    match (task.is_recurring, task.completed) {
        (true, true) => println!(
            "Task {} is {state} ({}).",
            task.id,
            task.week.unwrap_or(Week::FIRST)
        ),
        _ => println!("Task {} is {state}.", task.id),
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_task_delete(store: &DataStore, task: &str) -> anyhow::Result<()> {
    info!("command task delete");

    let existing = store.find_task(task)?;
    store.delete_task(&existing.id)?;
    println!("Deleted task {}.", existing.id);
    Ok(())
}

#[instrument(skip(store, cfg, renderer, today))]
fn cmd_board(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    goal: &str,
    all_weeks: bool,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command board");

    let goal = store.find_goal(goal)?;
    let tasks = store.tasks_for_goal(&goal.id)?;
    let visibility = store.load_visibility(&goal.id, cfg.show_all_weeks_default())?;
    let current_week = current_week_for_goal(store, &goal.id, today);
    let quarter = goal.quarter.as_deref().and_then(Quarter::parse);

    let show_all_weeks = all_weeks || visibility.show_all_weeks();
    let board = group_and_filter(&tasks, current_week, show_all_weeks);

    renderer.print_board(
        &board,
        BoardContext {
            goal: &goal,
            quarter,
            visibility: &visibility,
        },
    )
}

#[instrument(skip(store, cfg))]
fn cmd_view_all_weeks(store: &DataStore, cfg: &Config, goal: &str) -> anyhow::Result<()> {
    info!("command view all-weeks");

    let goal = store.find_goal(goal)?;
    let mut visibility = store.load_visibility(&goal.id, cfg.show_all_weeks_default())?;
    visibility.toggle_show_all_weeks();
    store.save_visibility(&goal.id, &visibility)?;

    let state = if visibility.show_all_weeks() {
        "all weeks"
    } else {
        "weeks with tasks and the current week"
    };
    println!("Board for {} now shows {state}.", goal.title);
    Ok(())
}

#[instrument(skip(store, cfg))]
fn cmd_view_completed(
    store: &DataStore,
    cfg: &Config,
    goal: &str,
    week: Week,
) -> anyhow::Result<()> {
    info!("command view completed");

    let goal = store.find_goal(goal)?;
    let mut visibility = store.load_visibility(&goal.id, cfg.show_all_weeks_default())?;
    visibility.toggle_completed_for_week(week);
    store.save_visibility(&goal.id, &visibility)?;

    let state = if visibility.is_completed_visible(week) {
        "shown"
    } else {
        "hidden"
    };
    println!("Completed tasks in {week} are now {state}.");
    Ok(())
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}
