//! Cron-like daily trigger plus the catch-up/weekly arithmetic shared by
//! every engine's scheduler loop (§4.4, §9). A standard cron expression
//! (the `cron` crate, 6 fields including seconds) is sufficient; weekly
//! logic is plain calendar arithmetic computed from the injected [`Clock`].

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc, Weekday};
use cron::Schedule;

/// Wraps a parsed cron expression for computing the next daily fire time.
#[derive(Clone)]
pub struct DailyTrigger {
    schedule: Schedule,
}

impl DailyTrigger {
    pub fn parse(cron_expr: &str) -> Result<Self> {
        let schedule = Schedule::from_str(cron_expr)
            .with_context(|| format!("parsing cron expression '{cron_expr}'"))?;
        Ok(Self { schedule })
    }

    /// The next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// True if `now` is at or past the next scheduled fire time after
    /// `last_run_at` (or if there has never been a run).
    pub fn has_fired(&self, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_run_at {
            None => true,
            Some(last) => match self.next_after(last) {
                Some(next) => now >= next,
                None => false,
            },
        }
    }
}

/// A catch-up run is triggered when the last run is older than
/// `catchup_hours` (§4.4 step 2).
pub fn is_stale(last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>, catchup_hours: u32) -> bool {
    match last_run_at {
        None => true,
        Some(last) => now.signed_duration_since(last).num_hours() >= catchup_hours as i64,
    }
}

/// Weekly catch-up (Card Discovery only) fires on Sundays at the
/// configured hour (§4.4 step 3).
pub fn is_sunday(now: DateTime<Utc>) -> bool {
    now.weekday() == Weekday::Sun
}

/// The Monday that starts `date`'s ISO week — the boundary the weekly byte
/// budget resets on (§4.10, mirrored by `memloop_ledger::CardDiscoveryState`).
pub fn iso_week_monday(date: chrono::NaiveDate) -> chrono::NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn never_run_is_always_stale() {
        assert!(is_stale(None, Utc::now(), 24));
    }

    #[test]
    fn stale_after_threshold_not_before() {
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap();
        let just_under = Utc.with_ymd_and_hms(2026, 1, 2, 2, 59, 0).unwrap();
        let just_over = Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap();
        assert!(!is_stale(Some(last), just_under, 24));
        assert!(is_stale(Some(last), just_over, 24));
    }

    #[test]
    fn daily_trigger_fires_once_per_day_at_configured_hour() {
        let trigger = DailyTrigger::parse("0 0 3 * * *").unwrap();
        let last_run = Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap();

        let before_next = Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap();
        assert!(!trigger.has_fired(Some(last_run), before_next));

        let after_next = Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 1).unwrap();
        assert!(trigger.has_fired(Some(last_run), after_next));
    }

    #[test]
    fn daily_trigger_always_fires_when_never_run() {
        let trigger = DailyTrigger::parse("0 0 3 * * *").unwrap();
        assert!(trigger.has_fired(None, Utc::now()));
    }

    #[test]
    fn sunday_detection() {
        let sunday = Utc.with_ymd_and_hms(2026, 1, 4, 3, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        assert!(is_sunday(sunday));
        assert!(!is_sunday(monday));
    }

    #[test]
    fn iso_week_monday_is_stable_across_the_week() {
        let monday = chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let wednesday = chrono::NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        assert_eq!(iso_week_monday(monday), monday);
        assert_eq!(iso_week_monday(wednesday), monday);
    }
}
