use std::collections::BTreeMap;

use tracing::debug;

use crate::projector::{
  TaskInstance,
  project
};
use crate::quarter::Week;
use crate::task::Task;
use crate::visibility::VisibilityState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekBucket<'a> {
  pub week:      Week,
  pub instances: Vec<TaskInstance<'a>>
}

impl<'a> WeekBucket<'a> {
  #[must_use]
  pub fn key(&self) -> String {
    self.week.key()
  }

  #[must_use]
  pub fn is_current(
    &self,
    current_week: Option<Week>
  ) -> bool {
    current_week == Some(self.week)
  }

  #[must_use]
  pub fn open_count(&self) -> usize {
    self
      .instances
      .iter()
      .filter(|i| !i.completed())
      .count()
  }

  #[must_use]
  pub fn completed_count(
    &self
  ) -> usize {
    self.instances.len()
      - self.open_count()
  }

  /// Open instances, plus completed ones
  /// when this week shows them.
  pub fn visible_instances<'s>(
    &'s self,
    visibility: &VisibilityState
  ) -> impl Iterator<Item = &'s TaskInstance<'a>>
  {
    let show_completed = visibility
      .is_completed_visible(self.week);
    self.instances.iter().filter(
      move |instance| {
        show_completed
          || !instance.completed()
      }
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekBoard<'a> {
  /// The goal has no tasks at all.
  NoActiveTasks,
  Weeks {
    current_week: Option<Week>,
    buckets:      Vec<WeekBucket<'a>>
  }
}

impl<'a> WeekBoard<'a> {
  #[must_use]
  pub fn buckets(
    &self
  ) -> &[WeekBucket<'a>] {
    match self {
      | Self::NoActiveTasks => &[],
      | Self::Weeks {
        buckets, ..
      } => buckets
    }
  }

  #[must_use]
  pub fn weeks(&self) -> Vec<Week> {
    self
      .buckets()
      .iter()
      .map(|b| b.week)
      .collect()
  }
}

/// Projects every task into its weeks
/// and picks the weeks to display.
///
/// With `show_all_weeks` all twelve weeks
/// are kept. Otherwise a week is kept
/// when it has an instance or is the
/// current week. The current week sorts
/// first, the rest ascend.
#[tracing::instrument(skip(tasks), fields(task_count = tasks.len()))]
pub fn group_and_filter(
  tasks: &[Task],
  current_week: Option<Week>,
  show_all_weeks: bool
) -> WeekBoard<'_> {
  if tasks.is_empty() {
    debug!("no tasks; nothing to group");
    return WeekBoard::NoActiveTasks;
  }

  let mut grouped: BTreeMap<
    Week,
    Vec<TaskInstance<'_>>
  > = Week::all()
    .map(|week| (week, Vec::new()))
    .collect();

  for task in tasks {
    for instance in project(task) {
      grouped
        .entry(instance.week)
        .or_default()
        .push(instance);
    }
  }

  let mut buckets: Vec<WeekBucket<'_>> =
    grouped
      .into_iter()
      .filter(|(week, instances)| {
        show_all_weeks
          || !instances.is_empty()
          || current_week == Some(*week)
      })
      .map(|(week, instances)| {
        WeekBucket {
          week,
          instances
        }
      })
      .collect();

  buckets.sort_by_key(|bucket| {
    (
      !bucket.is_current(current_week),
      bucket.week
    )
  });

  debug!(
    current_week = current_week
      .map(Week::number),
    show_all_weeks,
    eligible = buckets.len(),
    "grouped tasks into weeks"
  );

  WeekBoard::Weeks {
    current_week,
    buckets
  }
}
