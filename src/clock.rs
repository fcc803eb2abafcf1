// File: src/clock.rs
//! Injected date capability.
//!
//! The recurrence code never asks for "now" on its own; callers pass the
//! anchor in, and the controller gets it from a `Clock`.
use chrono::{Local, NaiveDate};

pub trait Clock: Send + Sync {
    /// The calendar date rescheduling is evaluated against.
    fn today(&self) -> NaiveDate;
}

/// Reads the local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        // An all-day task is due on the user's local date, not the UTC one.
        Local::now().date_naive()
    }
}

/// Always returns the same date. Used by tests and by `recur next --from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
