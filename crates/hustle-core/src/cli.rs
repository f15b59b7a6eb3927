use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::quarter::{Quarter, Week};
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hustle",
    version,
    about = "Hustle: quarterly goals broken into weekly tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "hustlerc", global = true)]
    pub hustlerc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Pretend today is this day (today, yesterday, tomorrow or YYYY-MM-DD).
    #[arg(long = "today", global = true)]
    pub today: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage goals.
    #[command(subcommand)]
    Goal(GoalCommand),

    /// Manage the tasks of a goal.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Show a goal's tasks grouped by week.
    Board {
        goal: String,

        /// Show all twelve weeks for this invocation only.
        #[arg(long = "all-weeks")]
        all_weeks: bool,
    },

    /// Toggle how a goal's board is displayed.
    #[command(subcommand)]
    View(ViewCommand),

    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoalCommand {
    Add {
        title: String,

        #[arg(long = "quarter", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Quarter>()))]
        quarter: Option<Quarter>,
    },
    List,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ScheduleArgs {
    #[arg(long = "week", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Week>()))]
    pub week: Option<Week>,

    #[arg(long = "recurring")]
    pub recurring: bool,
}

/// Schedule flags for `task edit`. Leaving both out keeps the task's
/// current schedule.
#[derive(Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct ScheduleChange {
    #[arg(long = "week", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Week>()))]
    pub week: Option<Week>,

    #[arg(long = "recurring")]
    pub recurring: bool,
}

impl ScheduleChange {
    /// `(is_recurring, week)` after applying the flags to `task`.
    pub fn resolve(&self, task: &Task) -> (bool, Option<Week>) {
        match (self.recurring, self.week) {
            (true, _) => (true, None),
            (false, Some(week)) => (false, Some(week)),
            (false, None) => (task.is_recurring, task.week),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add {
        goal: String,

        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    Edit {
        task: String,

        #[arg(long = "title")]
        title: Option<String>,

        #[command(flatten)]
        schedule: ScheduleChange,
    },
    /// Mark a task done, or open again.
    Toggle { task: String },
    Delete { task: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ViewCommand {
    /// Toggle showing all twelve weeks.
    AllWeeks { goal: String },

    /// Toggle showing completed tasks in one week.
    Completed {
        goal: String,

        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Week>()))]
        week: Week,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of argv
/// before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::GoalId;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&[
            "hustle",
            "rc.color=off",
            "board",
            "rc.board.show_all_weeks:on",
            "abc",
        ]));
        assert_eq!(pre.cleaned_args, args(&["hustle", "board", "abc"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.board.show_all_weeks".to_string(), "on".to_string()),
            ]
        );
    }

    #[test]
    fn parses_task_add_with_week() {
        let cli = GlobalCli::try_parse_from([
            "hustle", "task", "add", "g1", "Submit", "report", "--week", "5",
        ])
        .expect("parse cli");
        match cli.command {
            Command::Task(TaskCommand::Add {
                goal,
                title,
                schedule,
            }) => {
                assert_eq!(goal, "g1");
                assert_eq!(title.join(" "), "Submit report");
                assert_eq!(schedule.week, Week::new(5));
                assert!(!schedule.recurring);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn task_add_needs_exactly_one_schedule() {
        assert!(GlobalCli::try_parse_from(["hustle", "task", "add", "g1", "Run"]).is_err());
        assert!(
            GlobalCli::try_parse_from([
                "hustle",
                "task",
                "add",
                "g1",
                "Run",
                "--week",
                "2",
                "--recurring",
            ])
            .is_err()
        );
        assert!(
            GlobalCli::try_parse_from(["hustle", "task", "add", "g1", "Run", "--week", "13"])
                .is_err()
        );
    }

    #[test]
    fn task_edit_schedule_is_optional() {
        let cli = GlobalCli::try_parse_from(["hustle", "task", "edit", "t1", "--title", "Renamed"])
            .expect("parse cli");
        let schedule = match cli.command {
            Command::Task(TaskCommand::Edit {
                task,
                title,
                schedule,
            }) => {
                assert_eq!(task, "t1");
                assert_eq!(title.as_deref(), Some("Renamed"));
                schedule
            }
            other => panic!("unexpected command: {other:?}"),
        };

        let week5 = Week::new(5).expect("week 5");
        let one_time = Task::one_time(GoalId::from("g"), "Report", week5);
        assert_eq!(schedule.resolve(&one_time), (false, Some(week5)));
        let recurring = Task::recurring(GoalId::from("g"), "Run");
        assert_eq!(schedule.resolve(&recurring), (true, None));

        assert!(
            GlobalCli::try_parse_from([
                "hustle",
                "task",
                "edit",
                "t1",
                "--week",
                "2",
                "--recurring",
            ])
            .is_err()
        );
    }

    #[test]
    fn task_edit_flags_override_current_schedule() {
        let week2 = Week::new(2).expect("week 2");
        let recurring = Task::recurring(GoalId::from("g"), "Run");
        let change = ScheduleChange {
            week: Some(week2),
            recurring: false,
        };
        assert_eq!(change.resolve(&recurring), (false, Some(week2)));

        let one_time = Task::one_time(GoalId::from("g"), "Report", week2);
        let change = ScheduleChange {
            week: None,
            recurring: true,
        };
        assert_eq!(change.resolve(&one_time), (true, None));
    }

    #[test]
    fn parses_view_completed_with_week_key() {
        let cli = GlobalCli::try_parse_from([
            "hustle", "-vv", "--rc", "color=off", "view", "completed", "g1", "week4",
        ])
        .expect("parse cli");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
        match cli.command {
            Command::View(ViewCommand::Completed { goal, week }) => {
                assert_eq!(goal, "g1");
                assert_eq!(week.number(), 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_goal_add_quarter() {
        let cli = GlobalCli::try_parse_from([
            "hustle",
            "goal",
            "add",
            "Learn Rust",
            "--quarter",
            "Q2-2025",
        ])
        .expect("parse cli");
        match cli.command {
            Command::Goal(GoalCommand::Add { title, quarter }) => {
                assert_eq!(title, "Learn Rust");
                assert_eq!(quarter, Quarter::new(2, 2025));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(
            GlobalCli::try_parse_from(["hustle", "goal", "add", "x", "--quarter", "Q9-2025"])
                .is_err()
        );
    }
}
