use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;

use crate::config::Config;

pub const TIMEZONE_ENV_VAR: &str =
  "HUSTLE_TIMEZONE";

#[tracing::instrument(skip(cfg))]
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "config")
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

#[must_use]
pub fn today_in(
  tz: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&tz).date_naive()
}

/// Parses the `--today` override:
/// `today`, `yesterday`, `tomorrow` or
/// `YYYY-MM-DD`.
#[tracing::instrument(skip(today))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();

  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Ok(today),
    | "yesterday" => {
      return Ok(
        today - Duration::days(1)
      );
    }
    | "tomorrow" => {
      return Ok(
        today + Duration::days(1)
      );
    }
    | _ => {}
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .map_err(|err| {
    anyhow!(
      "unrecognized date expression: \
       {input} ({err})"
    )
  })
  .context(
    "supported formats: \
     today/yesterday/tomorrow, \
     YYYY-MM-DD"
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn today_respects_timezone() {
    let now = Utc
      .with_ymd_and_hms(
        2024, 4, 1, 3, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      today_in(chrono_tz::UTC, now),
      date(2024, 4, 1)
    );
    assert_eq!(
      today_in(
        chrono_tz::America::Mexico_City,
        now
      ),
      date(2024, 3, 31)
    );
  }

  #[test]
  fn parses_day_expressions() {
    let today = date(2024, 1, 1);
    assert_eq!(
      parse_day_expr("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_day_expr("Yesterday", today)
        .expect("yesterday"),
      date(2023, 12, 31)
    );
    assert_eq!(
      parse_day_expr("tomorrow", today)
        .expect("tomorrow"),
      date(2024, 1, 2)
    );
    assert_eq!(
      parse_day_expr(
        "2024-02-29",
        today
      )
      .expect("iso date"),
      date(2024, 2, 29)
    );
    assert!(
      parse_day_expr("monday", today)
        .is_err()
    );
  }

  #[test]
  fn config_timezone_is_used() {
    if std::env::var(TIMEZONE_ENV_VAR)
      .is_ok()
    {
      return;
    }
    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "timezone".to_string(),
      "Europe/Berlin".to_string()
    )]);
    assert_eq!(
      resolve_timezone(&cfg),
      chrono_tz::Europe::Berlin
    );

    cfg.apply_overrides([(
      "timezone".to_string(),
      "Mars/Olympus".to_string()
    )]);
    assert_eq!(
      resolve_timezone(&cfg),
      chrono_tz::UTC
    );
  }
}
