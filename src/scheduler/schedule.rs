//! Rotation schedule expressions.
//!
//! # Accepted forms
//! - `@every 1h30m` (units `h`, `m`, `s`, `ms`)
//! - `every 6 hours` (`seconds`, `minutes`, `hours`, `days`)
//! - descriptors: `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//!   `@midnight`, `@hourly`
//! - six-field cron (`sec min hour dom month dow`, optional year)
//! - five-field cron (seconds fixed at 0)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

/// Errors produced while parsing a schedule expression.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("empty schedule expression")]
    Empty,

    #[error("invalid interval {0:?}")]
    InvalidInterval(String),

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("invalid cron expression {expr:?}: {reason}")]
    Cron { expr: String, reason: String },
}

/// A parsed rotation schedule.
#[derive(Clone)]
pub enum RotationSchedule {
    /// Fixed period measured from the previous firing.
    Every(Duration),
    /// Calendar-anchored cron schedule.
    Calendar {
        expr: String,
        schedule: Box<cron::Schedule>,
    },
}

impl RotationSchedule {
    /// The first firing strictly after `now`.
    ///
    /// Calendar schedules are evaluated in local time when `local` is set.
    pub fn next_after(&self, now: DateTime<Utc>, local: bool) -> Option<DateTime<Utc>> {
        match self {
            RotationSchedule::Every(period) => {
                let period = chrono::Duration::from_std(*period).ok()?;
                now.checked_add_signed(period)
            }
            RotationSchedule::Calendar { schedule, .. } if local => schedule
                .after(&now.with_timezone(&Local))
                .next()
                .map(|at| at.with_timezone(&Utc)),
            RotationSchedule::Calendar { schedule, .. } => schedule.after(&now).next(),
        }
    }

    /// The firing that follows `previous`, the last scheduled instant.
    ///
    /// Never returns `previous` itself or an instant before `now`; missed
    /// firings are skipped.
    pub fn next_firing(
        &self,
        previous: DateTime<Utc>,
        now: DateTime<Utc>,
        local: bool,
    ) -> Option<DateTime<Utc>> {
        let next = self.next_after(previous, local)?;
        if next < now {
            self.next_after(now, local)
        } else {
            Some(next)
        }
    }

    /// How long to sleep from `now` until the next firing.
    pub fn delay_from(&self, now: DateTime<Utc>, local: bool) -> Option<Duration> {
        let next = self.next_after(now, local)?;
        Some((next - now).to_std().unwrap_or_default())
    }
}

impl fmt::Debug for RotationSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationSchedule::Every(period) => f.debug_tuple("Every").field(period).finish(),
            RotationSchedule::Calendar { expr, .. } => {
                f.debug_tuple("Calendar").field(expr).finish()
            }
        }
    }
}

impl FromStr for RotationSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim();
        if expr.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if let Some(rest) = expr.strip_prefix("@every") {
            return every(parse_go_duration(rest.trim())?);
        }

        let lowered = expr.to_ascii_lowercase();
        if let Some(rest) = lowered.strip_prefix("every ") {
            return every(parse_spoken_interval(rest)?);
        }

        let normalized = match lowered.as_str() {
            "@yearly" | "@annually" => "0 0 0 1 1 *".to_string(),
            "@monthly" => "0 0 0 1 * *".to_string(),
            "@weekly" => "0 0 0 * * Sun".to_string(),
            "@daily" | "@midnight" => "0 0 0 * * *".to_string(),
            "@hourly" => "0 0 * * * *".to_string(),
            _ => {
                let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
                if fields.len() == 5 {
                    fields.insert(0, "0".to_string());
                }
                if let Some(dow) = fields.get_mut(5) {
                    *dow = name_weekdays(dow);
                }
                fields.join(" ")
            }
        };

        cron::Schedule::from_str(&normalized)
            .map(|schedule| RotationSchedule::Calendar {
                expr: normalized.clone(),
                schedule: Box::new(schedule),
            })
            .map_err(|e| ScheduleError::Cron {
                expr: expr.to_string(),
                reason: e.to_string(),
            })
    }
}

fn every(period: Duration) -> Result<RotationSchedule, ScheduleError> {
    if period.is_zero() {
        return Err(ScheduleError::ZeroInterval);
    }
    Ok(RotationSchedule::Every(period))
}

const WEEKDAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Rewrite numeric weekdays (0-7, Sunday = 0 or 7) as names.
///
/// The `cron` crate numbers weekdays 1-7 from Sunday; names mean the same
/// thing in both conventions. Numeric ranges and steps are expanded to lists.
fn name_weekdays(field: &str) -> String {
    field.split(',').map(name_weekday_item).collect::<Vec<_>>().join(",")
}

fn name_weekday_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };
    let bounds = match range.split_once('-') {
        Some((start, end)) => start.parse::<usize>().ok().zip(end.parse::<usize>().ok()),
        None if step.is_some() => range.parse::<usize>().ok().map(|start| (start, 6)),
        None => return weekday(range),
    };
    // Anything else is left for the cron parser to accept or reject.
    let (Some((start, end)), Ok(step)) = (bounds, step.unwrap_or("1").parse::<usize>()) else {
        return item.to_string();
    };
    if start > end || end >= WEEKDAYS.len() || step == 0 {
        return item.to_string();
    }

    let mut names: Vec<&str> = Vec::new();
    for name in (start..=end).step_by(step).map(|n| WEEKDAYS[n]) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(",")
}

fn weekday(token: &str) -> String {
    match token.parse::<usize>() {
        Ok(n) if n < WEEKDAYS.len() => WEEKDAYS[n].to_string(),
        _ => token.to_string(),
    }
}

/// Parse `1h30m`, `90s`, `500ms` style durations.
fn parse_go_duration(input: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(input.to_string());
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => return Err(invalid()),
        };
        total = total.saturating_add(unit);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Parse the tail of `every N hours`.
fn parse_spoken_interval(input: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(input.to_string());
    let mut parts = input.split_whitespace();
    let (Some(count), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let count: u64 = count.parse().map_err(|_| invalid())?;

    let seconds = match unit.trim_end_matches('s') {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" => 3600,
        "day" => 86_400,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(count.saturating_mul(seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn test_fixed_intervals() {
        let schedule: RotationSchedule = "@every 1h30m".parse().unwrap();
        assert_eq!(
            schedule.delay_from(at(10, 0, 0), false),
            Some(Duration::from_secs(5400))
        );

        let schedule: RotationSchedule = "every 2 hours".parse().unwrap();
        assert_eq!(schedule.next_after(at(10, 0, 0), false), Some(at(12, 0, 0)));

        let schedule: RotationSchedule = "Every 1 minute".parse().unwrap();
        assert_eq!(schedule.delay_from(at(10, 0, 0), false), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_calendar_expressions() {
        let midnight: RotationSchedule = "@midnight".parse().unwrap();
        let next = midnight.next_after(at(10, 15, 0), false).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        let six_field: RotationSchedule = "0 30 * * * *".parse().unwrap();
        assert_eq!(six_field.next_after(at(10, 15, 0), false), Some(at(10, 30, 0)));

        let five_field: RotationSchedule = "0 */6 * * *".parse().unwrap();
        let next = five_field.next_after(at(10, 15, 0), false).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (12, 0, 0));
    }

    #[test]
    fn test_next_firing_anchors_on_the_previous_instant() {
        let hourly: RotationSchedule = "@every 1h".parse().unwrap();
        // A rotation that took 30s does not push the next firing back.
        assert_eq!(
            hourly.next_firing(at(10, 0, 0), at(10, 0, 30), false),
            Some(at(11, 0, 0))
        );
        // An overrun skips the missed firing instead of bursting.
        assert_eq!(
            hourly.next_firing(at(10, 0, 0), at(11, 30, 0), false),
            Some(at(12, 30, 0))
        );

        // The wall clock reads just before the midnight that already fired.
        let daily: RotationSchedule = "@daily".parse().unwrap();
        let fired = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(
            daily.next_firing(fired, at(23, 59, 59), false),
            Some(Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_local_calendar_fires_at_local_midnight() {
        let daily: RotationSchedule = "@daily".parse().unwrap();
        let now = Utc::now();

        let next = daily.next_after(now, true).unwrap();
        let local = next.with_timezone(&Local);

        assert_eq!((local.hour(), local.minute(), local.second()), (0, 0, 0));
        assert!(next > now);
        assert!(next - now <= chrono::Duration::hours(25));
    }

    #[test]
    fn test_numeric_weekdays_count_from_sunday() {
        // 2024-03-10 is a Sunday.
        let sunday: RotationSchedule = "0 0 * * 0".parse().unwrap();
        assert_eq!(
            sunday.next_after(at(12, 0, 0), false),
            Some(Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap())
        );

        let monday: RotationSchedule = "0 0 * * 1".parse().unwrap();
        assert_eq!(
            monday.next_after(at(12, 0, 0), false),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap())
        );

        let weekdays: RotationSchedule = "0 0 * * 1-5".parse().unwrap();
        let friday_noon = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            weekdays.next_after(friday_noon, false),
            Some(Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap())
        );

        let weekend: RotationSchedule = "0 0 0 * * 5-7".parse().unwrap();
        let saturday_noon = Utc.with_ymd_and_hms(2024, 3, 16, 12, 0, 0).unwrap();
        assert_eq!(
            weekend.next_after(saturday_noon, false),
            Some(Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap())
        );

        let seventh: RotationSchedule = "0 0 * * 7".parse().unwrap();
        assert_eq!(
            seventh.next_after(at(12, 0, 0), false),
            sunday.next_after(at(12, 0, 0), false)
        );
    }

    #[test]
    fn test_weekday_lists_and_steps_are_named() {
        assert_eq!(name_weekdays("*"), "*");
        assert_eq!(name_weekdays("0,3,6"), "SUN,WED,SAT");
        assert_eq!(name_weekdays("1-5/2"), "MON,WED,FRI");
        assert_eq!(name_weekdays("4-7"), "THU,FRI,SAT,SUN");
        assert_eq!(name_weekdays("0-7"), "SUN,MON,TUE,WED,THU,FRI,SAT");
        assert_eq!(name_weekdays("2/2"), "TUE,THU,SAT");
        assert_eq!(name_weekdays("*/2"), "*/2");
        assert_eq!(name_weekdays("Mon-Fri"), "Mon-Fri");
    }

    #[test]
    fn test_invalid_expressions_are_rejected() {
        assert!(matches!("".parse::<RotationSchedule>(), Err(ScheduleError::Empty)));
        assert!(matches!(
            "@every 0s".parse::<RotationSchedule>(),
            Err(ScheduleError::ZeroInterval)
        ));
        assert!(matches!(
            "@every soon".parse::<RotationSchedule>(),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            "every few hours".parse::<RotationSchedule>(),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            "not a schedule".parse::<RotationSchedule>(),
            Err(ScheduleError::Cron { .. })
        ));
    }
}
