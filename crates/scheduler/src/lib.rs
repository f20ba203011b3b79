//! C4 — Scheduler: the cron-like daily trigger, the on-startup catch-up
//! detector, and the re-entrancy guard, shared by every engine's run loop.
//! The daemon crate composes these primitives into the actual
//! `tokio::select!` task loop per engine (§9 "module-level state").

mod clock;
mod reentrancy;
mod trigger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use reentrancy::{ReentrancyGuard, RunPermit};
pub use trigger::{DailyTrigger, is_stale, is_sunday, iso_week_monday};
