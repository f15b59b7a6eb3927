use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  warn
};

use crate::quarter::Week;
use crate::task::GoalId;

/// User toggles that shape how a board
/// is presented. Never changes which
/// instances a bucket holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityState {
  show_all_weeks:    bool,
  completed_visible:
    Arc<BTreeMap<Week, bool>>
}

impl Default for VisibilityState {
  fn default() -> Self {
    Self::new(false)
  }
}

impl VisibilityState {
  #[must_use]
  pub fn new(
    show_all_weeks: bool
  ) -> Self {
    Self {
      show_all_weeks,
      completed_visible: Arc::new(
        BTreeMap::new()
      )
    }
  }

  #[must_use]
  pub fn show_all_weeks(&self) -> bool {
    self.show_all_weeks
  }

  pub fn toggle_show_all_weeks(
    &mut self
  ) {
    self.show_all_weeks =
      !self.show_all_weeks;
    debug!(
      show_all_weeks =
        self.show_all_weeks,
      "toggled show all weeks"
    );
  }

  /// Flips one week's flag. Builds a new
  /// mapping, so snapshots taken earlier
  /// keep the old values.
  pub fn toggle_completed_for_week(
    &mut self,
    week: Week
  ) {
    let mut next =
      (*self.completed_visible).clone();
    let flag = next
      .entry(week)
      .or_insert(false);
    *flag = !*flag;
    debug!(
      week = week.number(),
      visible = *flag,
      "toggled completed visibility"
    );
    self.completed_visible =
      Arc::new(next);
  }

  #[must_use]
  pub fn is_completed_visible(
    &self,
    week: Week
  ) -> bool {
    self
      .completed_visible
      .get(&week)
      .copied()
      .unwrap_or(false)
  }

  #[must_use]
  pub fn completed_snapshot(
    &self
  ) -> Arc<BTreeMap<Week, bool>> {
    Arc::clone(&self.completed_visible)
  }

  #[must_use]
  pub fn to_record(
    &self,
    goal_id: &GoalId
  ) -> VisibilityRecord {
    VisibilityRecord {
      goal_id:           goal_id.clone(),
      show_all_weeks:    self
        .show_all_weeks,
      completed_visible: self
        .completed_visible
        .iter()
        .map(|(week, visible)| {
          (week.key(), *visible)
        })
        .collect()
    }
  }

  #[must_use]
  pub fn from_record(
    record: &VisibilityRecord
  ) -> Self {
    let mut completed_visible =
      BTreeMap::new();
    for (key, visible) in
      &record.completed_visible
    {
      match Week::from_key(key) {
        | Some(week) => {
          completed_visible
            .insert(week, *visible);
        }
        | None => {
          warn!(
            goal = %record.goal_id,
            key = %key,
            "ignoring unknown week key in visibility record"
          );
        }
      }
    }

    Self {
      show_all_weeks:    record
        .show_all_weeks,
      completed_visible: Arc::new(
        completed_visible
      )
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRecord {
  pub goal_id:           GoalId,
  #[serde(default)]
  pub show_all_weeks:    bool,
  #[serde(default)]
  pub completed_visible:
    BTreeMap<String, bool>
}

#[cfg(test)]
mod tests {
  use super::*;

  fn week(n: u8) -> Week {
    Week::new(n).expect("valid week")
  }

  #[test]
  fn completed_hidden_by_default() {
    let state = VisibilityState::default();
    assert!(!state.show_all_weeks());
    assert!(Week::all().all(|w| {
      !state.is_completed_visible(w)
    }));
  }

  #[test]
  fn toggle_touches_only_target_week() {
    let mut state =
      VisibilityState::new(false);
    state
      .toggle_completed_for_week(week(2));
    state
      .toggle_completed_for_week(week(5));
    state
      .toggle_completed_for_week(week(2));

    assert!(
      !state.is_completed_visible(week(2))
    );
    assert!(
      state.is_completed_visible(week(5))
    );
    assert!(
      !state.is_completed_visible(week(6))
    );
  }

  #[test]
  fn snapshots_are_not_mutated_by_toggles()
  {
    let mut state =
      VisibilityState::new(false);
    state
      .toggle_completed_for_week(week(3));
    let before =
      state.completed_snapshot();

    state
      .toggle_completed_for_week(week(3));
    state
      .toggle_completed_for_week(week(9));

    assert_eq!(
      before.get(&week(3)),
      Some(&true)
    );
    assert_eq!(before.get(&week(9)), None);
    assert!(
      !state.is_completed_visible(week(3))
    );
    assert!(
      state.is_completed_visible(week(9))
    );
  }

  #[test]
  fn show_all_weeks_toggles() {
    let mut state =
      VisibilityState::new(true);
    state.toggle_show_all_weeks();
    assert!(!state.show_all_weeks());
    state.toggle_show_all_weeks();
    assert!(state.show_all_weeks());
  }

  #[test]
  fn record_round_trip_skips_bad_keys() {
    let goal = GoalId::from("g1");
    let mut state =
      VisibilityState::new(true);
    state
      .toggle_completed_for_week(week(4));

    let mut record =
      state.to_record(&goal);
    assert_eq!(
      record.completed_visible.get("week4"),
      Some(&true)
    );

    record
      .completed_visible
      .insert("week99".to_string(), true);
    let restored =
      VisibilityState::from_record(
        &record
      );
    assert_eq!(restored, state);
  }
}
