use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Duration,
  NaiveDate
};
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  warn
};

use crate::store::QuarterLookup;
use crate::task::GoalId;

pub const WEEKS_PER_QUARTER: u8 = 12;

/// A week of a quarter, always within
/// 1..=12.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(
  try_from = "u8",
  into = "u8"
)]
pub struct Week(u8);

impl Week {
  pub const FIRST: Week = Week(1);
  pub const LAST: Week =
    Week(WEEKS_PER_QUARTER);

  #[must_use]
  pub fn new(n: u8) -> Option<Self> {
    (1..=WEEKS_PER_QUARTER)
      .contains(&n)
      .then_some(Self(n))
  }

  #[must_use]
  pub fn from_i64(n: i64) -> Option<Self> {
    u8::try_from(n)
      .ok()
      .and_then(Self::new)
  }

  #[must_use]
  pub fn number(self) -> u8 {
    self.0
  }

  /// Bucket key of the form `week<N>`.
  #[must_use]
  pub fn key(self) -> String {
    format!("week{}", self.0)
  }

  /// Accepts `week<N>` or a bare `N`.
  #[must_use]
  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    let trimmed = key.trim();
    let digits = trimmed
      .strip_prefix("week")
      .unwrap_or(trimmed);
    digits
      .parse::<u8>()
      .ok()
      .and_then(Self::new)
  }

  pub fn all()
  -> impl DoubleEndedIterator<Item = Week>
  {
    (1..=WEEKS_PER_QUARTER).map(Week)
  }
}

impl TryFrom<u8> for Week {
  type Error = String;

  fn try_from(
    value: u8
  ) -> Result<Self, Self::Error> {
    Self::new(value).ok_or_else(|| {
      format!(
        "week must be within 1..={WEEKS_PER_QUARTER}, got {value}"
      )
    })
  }
}

impl From<Week> for u8 {
  fn from(week: Week) -> Self {
    week.0
  }
}

impl fmt::Display for Week {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(f, "Week {}", self.0)
  }
}

impl FromStr for Week {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      anyhow!(
        "expected a week between 1 and \
         {WEEKS_PER_QUARTER} (or \
         week<N>), got: {s}"
      )
    })
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct Quarter {
  number: u8,
  year:   i32
}

impl Quarter {
  #[must_use]
  pub fn new(
    number: u8,
    year: i32
  ) -> Option<Self> {
    (1..=4).contains(&number).then_some(
      Self {
        number,
        year
      }
    )
  }

  /// Parses labels like `Q1-2024`.
  #[must_use]
  pub fn parse(
    label: &str
  ) -> Option<Self> {
    let caps = quarter_label_re()?
      .captures(label)?;
    let number = caps
      .name("q")?
      .as_str()
      .parse::<u8>()
      .ok()?;
    let year = caps
      .name("year")?
      .as_str()
      .parse::<i32>()
      .ok()?;
    Self::new(number, year)
  }

  #[must_use]
  pub fn containing(
    date: NaiveDate
  ) -> Self {
    let number =
      ((date.month0() / 3) + 1) as u8;
    Self {
      number,
      year: date.year()
    }
  }

  #[must_use]
  pub fn number(self) -> u8 {
    self.number
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.year
  }

  #[must_use]
  pub fn start_date(self) -> NaiveDate {
    let month =
      u32::from(self.number - 1) * 3 + 1;
    NaiveDate::from_ymd_opt(
      self.year, month, 1
    )
    .unwrap_or(NaiveDate::MIN)
  }

  #[must_use]
  pub fn end_date(self) -> NaiveDate {
    let next_start = if self.number == 4
    {
      NaiveDate::from_ymd_opt(
        self.year.saturating_add(1),
        1,
        1
      )
    } else {
      NaiveDate::from_ymd_opt(
        self.year,
        u32::from(self.number) * 3 + 1,
        1
      )
    };
    next_start
      .and_then(|d| d.pred_opt())
      .unwrap_or(NaiveDate::MAX)
  }

  #[must_use]
  pub fn week_dates(
    self,
    week: Week
  ) -> (NaiveDate, NaiveDate) {
    let offset = i64::from(
      week.number() - 1
    ) * 7;
    let start = add_days(
      self.start_date(),
      offset
    );
    (start, add_days(start, 6))
  }

  #[must_use]
  pub fn week_of(
    self,
    today: NaiveDate
  ) -> Week {
    let elapsed_days = (today
      - self.start_date())
    .num_days();
    let elapsed_weeks =
      elapsed_days.div_euclid(7);
    let clamped = (elapsed_weeks + 1)
      .clamp(
        1,
        i64::from(WEEKS_PER_QUARTER)
      );
    Week::from_i64(clamped)
      .unwrap_or(Week::FIRST)
  }

  #[must_use]
  pub fn title(self) -> String {
    format!(
      "Q{} {}",
      self.number, self.year
    )
  }
}

impl fmt::Display for Quarter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "Q{}-{}",
      self.number, self.year
    )
  }
}

impl FromStr for Quarter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| {
      anyhow!(
        "expected a quarter like \
         Q1-2024, got: {s}"
      )
    })
  }
}

/// Week of the quarter named by `label`
/// that contains `today`, or `None` when
/// the label is empty or unparseable.
#[tracing::instrument(skip(today))]
pub fn current_week_in_quarter(
  label: &str,
  today: NaiveDate
) -> Option<Week> {
  if label.trim().is_empty() {
    debug!("no quarter label; no current week");
    return None;
  }

  let Some(quarter) =
    Quarter::parse(label)
  else {
    warn!(
      label,
      "unparseable quarter label; no current week"
    );
    return None;
  };

  let week = quarter.week_of(today);
  debug!(
    quarter = %quarter,
    today = %today,
    week = week.number(),
    "resolved current week"
  );
  Some(week)
}

pub fn current_week_for_goal(
  lookup: &dyn QuarterLookup,
  goal_id: &GoalId,
  today: NaiveDate
) -> Option<Week> {
  let label =
    lookup.quarter_for_goal(goal_id)?;
  current_week_in_quarter(&label, today)
}

fn quarter_label_re() -> Option<&'static Regex>
{
  static QUARTER_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  QUARTER_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^\s*Q(?P<q>[1-4])(?:-|\s+)(?P<year>\d{4})\s*$"
      )
      .map_err(|err| {
        tracing::error!(
          error = %err,
          "internal quarter regex compile failure"
        );
      })
      .ok()
    })
    .as_ref()
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}
