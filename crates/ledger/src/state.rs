//! Per-engine state documents: the extraction driver's run record and the
//! card discovery engine's daily/weekly run record, each wrapping a
//! [`Ledger`].

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Ledger;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub ledger: Ledger,
}

impl ExtractionState {
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => Ok(state),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "extraction state failed schema validation — starting fresh");
                    Ok(Self::default())
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("reading extraction state at {}", path.display())),
        }
    }

    pub async fn persist(&self, path: &Path) -> Result<()> {
        let rendered = serde_json::to_vec_pretty(self)?;
        memloop_vault::write_atomic(path, &rendered)
            .await
            .with_context(|| format!("persisting extraction state to {}", path.display()))
    }

    pub fn is_stale(&self, now: DateTime<Utc>, catchup_hours: u32) -> bool {
        match self.last_run_at {
            None => true,
            Some(last) => now.signed_duration_since(last).num_hours() >= catchup_hours as i64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardDiscoveryState {
    pub last_daily_run: Option<DateTime<Utc>>,
    pub last_weekly_run: Option<DateTime<Utc>>,
    /// Bytes consumed against the weekly catch-up budget so far this ISO week.
    pub weekly_budget_used_bytes: u64,
    /// The Monday that starts the ISO week the budget above applies to.
    pub weekly_budget_week_start: Option<NaiveDate>,
    pub ledger: Ledger,
}

impl CardDiscoveryState {
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => Ok(state),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "card discovery state failed schema validation — starting fresh");
                    Ok(Self::default())
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("reading card discovery state at {}", path.display())),
        }
    }

    pub async fn persist(&self, path: &Path) -> Result<()> {
        let rendered = serde_json::to_vec_pretty(self)?;
        memloop_vault::write_atomic(path, &rendered)
            .await
            .with_context(|| format!("persisting card discovery state to {}", path.display()))
    }

    /// Reset the weekly budget if `today`'s ISO week does not match the
    /// stored week-start Monday.
    pub fn roll_weekly_budget(&mut self, today: NaiveDate) {
        let iso_monday = today - chrono::Duration::days(today.weekday().num_days_from_monday() as i64);
        if self.weekly_budget_week_start != Some(iso_monday) {
            self.weekly_budget_week_start = Some(iso_monday);
            self.weekly_budget_used_bytes = 0;
        }
    }

    pub fn remaining_weekly_budget(&self, budget_bytes: u64) -> u64 {
        budget_bytes.saturating_sub(self.weekly_budget_used_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extraction_state_is_stale_when_never_run() {
        let state = ExtractionState::default();
        assert!(state.is_stale(Utc::now(), 24));
    }

    #[test]
    fn extraction_state_is_stale_after_catchup_threshold() {
        let mut state = ExtractionState::default();
        state.last_run_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        assert!(state.is_stale(now, 24));
    }

    #[test]
    fn extraction_state_not_stale_within_threshold() {
        let mut state = ExtractionState::default();
        state.last_run_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        assert!(!state.is_stale(now, 24));
    }

    #[test]
    fn weekly_budget_resets_on_new_iso_week() {
        let mut state = CardDiscoveryState::default();
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        state.roll_weekly_budget(monday);
        state.weekly_budget_used_bytes = 400_000;

        let next_monday = NaiveDate::from_ymd_opt(2026, 1, 12).unwrap();
        state.roll_weekly_budget(next_monday);
        assert_eq!(state.weekly_budget_used_bytes, 0);
        assert_eq!(state.weekly_budget_week_start, Some(next_monday));
    }

    #[test]
    fn weekly_budget_persists_within_same_iso_week() {
        let mut state = CardDiscoveryState::default();
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        state.roll_weekly_budget(monday);
        state.weekly_budget_used_bytes = 100_000;

        let wednesday = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        state.roll_weekly_budget(wednesday);
        assert_eq!(state.weekly_budget_used_bytes, 100_000);
    }

    #[test]
    fn remaining_weekly_budget_saturates_at_zero() {
        let mut state = CardDiscoveryState::default();
        state.weekly_budget_used_bytes = 600_000;
        assert_eq!(state.remaining_weekly_budget(500_000), 0);
    }
}
