use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::board::{WeekBoard, WeekBucket};
use crate::config::Config;
use crate::quarter::{Quarter, Week};
use crate::task::Goal;
use crate::visibility::VisibilityState;

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

/// Everything the board printer needs besides the grouped weeks.
#[derive(Debug, Clone, Copy)]
pub struct BoardContext<'a> {
    pub goal: &'a Goal,
    pub quarter: Option<Quarter>,
    pub visibility: &'a VisibilityState,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, board, ctx))]
    pub fn print_board(&self, board: &WeekBoard<'_>, ctx: BoardContext<'_>) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_board(out, board, ctx)
    }

    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        board: &WeekBoard<'_>,
        ctx: BoardContext<'_>,
    ) -> anyhow::Result<()> {
        let quarter = ctx
            .quarter
            .map(|q| q.title())
            .unwrap_or_else(|| "no quarter".to_string());
        writeln!(out, "{} ({})", self.paint(&ctx.goal.title, "1"), quarter)?;

        let (current_week, buckets) = match board {
            WeekBoard::NoActiveTasks => {
                writeln!(out)?;
                writeln!(out, "No active tasks")?;
                return Ok(());
            }
            WeekBoard::Weeks {
                current_week,
                buckets,
            } => (*current_week, buckets),
        };

        if buckets.is_empty() {
            writeln!(out)?;
            writeln!(out, "No weeks to show")?;
            return Ok(());
        }

        for bucket in buckets {
            writeln!(out)?;
            self.write_bucket(&mut out, bucket, current_week, ctx)?;
        }

        Ok(())
    }

    fn write_bucket<W: Write>(
        &self,
        out: &mut W,
        bucket: &WeekBucket<'_>,
        current_week: Option<Week>,
        ctx: BoardContext<'_>,
    ) -> anyhow::Result<()> {
        let mut heading = bucket.week.to_string();
        if let Some(quarter) = ctx.quarter {
            let (start, end) = quarter.week_dates(bucket.week);
            heading = format!("{heading}  {} - {}", start.format("%b %d"), end.format("%b %d"));
        }
        if bucket.is_current(current_week) {
            heading = format!("{heading}  {}", self.paint("(current)", "32"));
        }
        writeln!(out, "{heading}")?;

        if bucket.instances.is_empty() {
            writeln!(out, "  nothing scheduled")?;
            return Ok(());
        }

        let rows: Vec<Vec<String>> = bucket
            .visible_instances(ctx.visibility)
            .map(|instance| {
                let id: String = instance.id().as_str().chars().take(SHORT_ID_LEN).collect();
                let status = if instance.completed() {
                    self.paint("done", "90")
                } else {
                    "open".to_string()
                };
                vec![
                    self.paint(&id, "33"),
                    status,
                    instance.title().to_string(),
                    instance.task.schedule_label(),
                ]
            })
            .collect();

        if rows.is_empty() {
            writeln!(out, "  all tasks completed")?;
        } else {
            let headers = ["ID", "Status", "Task", "Schedule"]
                .into_iter()
                .map(str::to_string)
                .collect();
            write_table(&mut *out, headers, rows)?;
        }

        let completed = bucket.completed_count();
        if completed > 0 && !ctx.visibility.is_completed_visible(bucket.week) {
            writeln!(
                out,
                "  {completed} completed hidden (hustle view completed {} {})",
                ctx.goal.id,
                bucket.key()
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, goals))]
    pub fn print_goals(&self, goals: &[(Goal, Option<Week>)]) -> anyhow::Result<()> {
        let out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Quarter".to_string(),
            "Current".to_string(),
            "Goal".to_string(),
        ];

        let rows = goals
            .iter()
            .map(|(goal, current_week)| {
                let id: String = goal.id.as_str().chars().take(SHORT_ID_LEN).collect();
                vec![
                    self.paint(&id, "33"),
                    goal.quarter.clone().unwrap_or_else(|| "-".to_string()),
                    current_week
                        .map(|week| week.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    goal.title.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let render_line = |cells: &[String]| -> String {
        let mut line = String::from(" ");
        for (idx, cell) in cells.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
        }
        line.trim_end().to_string()
    };

    writeln!(writer, "{}", render_line(&headers))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", render_line(&rule))?;
    for row in &rows {
        writeln!(writer, "{}", render_line(row))?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::group_and_filter;
    use crate::task::{GoalId, Task};

    fn render(board: &WeekBoard<'_>, ctx: BoardContext<'_>) -> String {
        let renderer = Renderer { color: false };
        let mut buf = Vec::new();
        renderer
            .write_board(&mut buf, board, ctx)
            .expect("render board");
        String::from_utf8(buf).expect("utf8 output")
    }

    fn goal() -> Goal {
        Goal {
            id: GoalId::from("goal-1"),
            title: "Get fit".to_string(),
            quarter: Some("Q1-2024".to_string()),
        }
    }

    #[test]
    fn empty_goal_says_no_active_tasks() {
        let goal = goal();
        let visibility = VisibilityState::default();
        let ctx = BoardContext {
            goal: &goal,
            quarter: Quarter::parse("Q1-2024"),
            visibility: &visibility,
        };
        let text = render(&group_and_filter(&[], None, false), ctx);
        assert!(text.contains("No active tasks"));
    }

    #[test]
    fn hidden_completed_tasks_are_counted() {
        let goal = goal();
        let week5 = Week::new(5).expect("week 5");
        let mut done = Task::one_time(goal.id.clone(), "Submit report", week5);
        done.completed = true;
        let open = Task::one_time(goal.id.clone(), "Book gym", week5);
        let tasks = vec![done, open];

        let mut visibility = VisibilityState::default();
        let board = group_and_filter(&tasks, Week::new(3), false);
        let ctx = BoardContext {
            goal: &goal,
            quarter: Quarter::parse("Q1-2024"),
            visibility: &visibility,
        };
        let text = render(&board, ctx);
        assert!(text.contains("Week 3  Jan 15 - Jan 21  (current)"));
        assert!(text.contains("nothing scheduled"));
        assert!(text.contains("Book gym"));
        assert!(!text.contains("Submit report"));
        assert!(text.contains("1 completed hidden"));

        visibility.toggle_completed_for_week(week5);
        let ctx = BoardContext {
            goal: &goal,
            quarter: Quarter::parse("Q1-2024"),
            visibility: &visibility,
        };
        let text = render(&board, ctx);
        assert!(text.contains("Submit report"));
        assert!(!text.contains("completed hidden"));
    }

    #[test]
    fn recurring_tasks_show_schedule_label() {
        let goal = goal();
        let tasks = vec![Task::recurring(goal.id.clone(), "Run")];
        let visibility = VisibilityState::default();
        let board = group_and_filter(&tasks, None, false);
        let ctx = BoardContext {
            goal: &goal,
            quarter: None,
            visibility: &visibility,
        };
        let text = render(&board, ctx);
        assert!(text.starts_with("Get fit (no quarter)"));
        assert_eq!(text.matches("Recurring Weekly").count(), 12);
        assert!(!text.contains("(current)"));
    }

    #[test]
    fn table_pads_wide_characters() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["日本".to_string(), "x".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "  A    B");
        assert_eq!(lines[1], "  ---- -");
        assert_eq!(lines[2], "  日本 x");
    }

    #[test]
    fn strip_ansi_removes_escapes() {
        assert_eq!(strip_ansi("\x1b[33mabc\x1b[0m"), "abc");
    }
}
