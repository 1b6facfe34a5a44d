//! # Medication Schedule
//!
//! Decides which [`MedicationState`] the day is in. The decision is a pure
//! function of the wall-clock time, the current state, the snooze window and
//! the last evaluated date; it never reads the clock itself so it can be
//! driven with arbitrary times in tests.
//!
//! Evaluation order, first match wins:
//! 1. **Day rollover**: the date differs from the day marker. Reset to
//!    UNMEDICATED, drop any snooze, remember the new date.
//! 2. **NAILED_IT** is sticky.
//! 3. **SNOOZE** holds until the window expires, then falls through.
//! 4. **Time of day**: unmedicated window, else soft reminder window, else
//!    hard reminder. Windows are half-open, `begin <= t < end`.

use crate::MedicationState;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Half-open time-of-day interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(begin: NaiveTime, end: NaiveTime) -> Self {
        TimeWindow { begin, end }
    }

    /// Windows do not wrap midnight; `begin >= end` contains nothing.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.begin <= t && t < self.end
    }
}

/// The two configured windows. Anything outside both is a hard reminder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub unmedicated: TimeWindow,
    pub soft_reminder: TimeWindow,
}

impl Schedule {
    /// Time-derived state, ignoring snooze, NAILED_IT and the date.
    pub fn state_at(&self, t: NaiveTime) -> MedicationState {
        if self.unmedicated.contains(t) {
            MedicationState::Unmedicated
        } else if self.soft_reminder.contains(t) {
            MedicationState::SoftReminder
        } else {
            MedicationState::HardReminder
        }
    }

    /// One schedule tick: the state `tracker` should be in at `now`.
    pub fn evaluate(&self, now: NaiveDateTime, tracker: Tracker) -> Tracker {
        let today = now.date();
        if tracker.day != today {
            return Tracker::new(today);
        }

        match tracker.state {
            MedicationState::NailedIt => tracker,
            MedicationState::Snooze if tracker.snooze_active(now) => tracker,
            _ => Tracker {
                state: self.state_at(now.time()),
                snooze_until: None,
                day: today,
            },
        }
    }
}

/// Authoritative medication state plus the data needed to advance it.
///
/// `snooze_until` is `Some` exactly when the state is SNOOZE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tracker {
    state: MedicationState,
    snooze_until: Option<NaiveDateTime>,
    day: NaiveDate,
}

impl Tracker {
    /// Fresh day: UNMEDICATED, no snooze.
    pub fn new(today: NaiveDate) -> Self {
        Tracker {
            state: MedicationState::Unmedicated,
            snooze_until: None,
            day: today,
        }
    }

    pub fn state(&self) -> MedicationState {
        self.state
    }

    pub fn snooze_until(&self) -> Option<NaiveDateTime> {
        self.snooze_until
    }

    /// Last date the schedule was evaluated for.
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    fn snooze_active(&self, now: NaiveDateTime) -> bool {
        self.snooze_until.is_some_and(|until| now < until)
    }

    /// Advance with the schedule. Returns `true` if the state changed.
    pub fn update_by_time(&mut self, now: NaiveDateTime, schedule: &Schedule) -> bool {
        let before = self.state;
        *self = schedule.evaluate(now, *self);
        self.state != before
    }

    /// Snooze button. Only honoured while a reminder (or snooze) is showing;
    /// the window always restarts from `now`.
    pub fn press_snooze(&mut self, now: NaiveDateTime, duration: chrono::Duration) -> bool {
        if !self.state.is_snoozable() {
            return false;
        }
        self.state = MedicationState::Snooze;
        self.snooze_until = Some(now + duration);
        true
    }

    /// Ok button toggles NAILED_IT. Leaving NAILED_IT lands on whatever the
    /// schedule says for `now`.
    pub fn press_ok(&mut self, now: NaiveDateTime, schedule: &Schedule) {
        if self.state != MedicationState::NailedIt {
            self.state = MedicationState::NailedIt;
            self.snooze_until = None;
        } else {
            self.state = MedicationState::Unmedicated;
            self.update_by_time(now, schedule);
        }
    }
}

/// Source of local wall-clock time.
pub trait Clock: Send {
    fn now(&self) -> NaiveDateTime;
}

/// The host's local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
