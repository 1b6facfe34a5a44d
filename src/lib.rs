//! # Vitaminder Core Library
//!
//! Host-side driver for the vitaminder status light: a small microcontroller
//! with one RGB pixel strip and two buttons (ok, snooze), connected over a
//! serial link. The host decides which "medication state" the day is in and
//! pushes LED color/brightness updates to the device using a fixed 8-byte
//! frame protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ time_updater  │──┐
//! ├───────────────┤  │   ┌────────────┐   ┌─────────────┐   ┌────────────┐
//! │ heartbeat     │──┼──▶│ EventQueue │──▶│ ControlLoop │──▶│ FrameSink  │
//! ├───────────────┤  │   └────────────┘   └─────────────┘   └────────────┘
//! │ serial_reader │──┘          ▲                │
//! └───────────────┘             └── STATE ───────┘ (button follow-up)
//! ```
//!
//! - **Producers** ([`producers`]) run on their own OS threads and only ever
//!   push [`protocol::Event`]s.
//! - **ControlLoop** ([`control`]) is the single consumer. It owns the
//!   [`schedule::Tracker`] (state, snooze window, day marker) and is the only
//!   writer on the serial link.
//! - **Shutdown** is cooperative: an EXIT event flips the shared
//!   [`event_queue::Lifecycle`] and wakes every sleeping thread.
//!
//! The serial reader and the control loop hold separate handles on the same
//! port, one per direction, so no lock is taken around the port itself.

use std::fmt;

pub mod config;
pub mod control;
pub mod daemon;
pub mod event_queue;
pub mod producers;
pub mod protocol;
pub mod schedule;
pub mod serial_link;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use control::ControlLoop;
pub use daemon::Daemon;
pub use event_queue::{EventQueue, Lifecycle};
pub use protocol::Event;

/// Medication state for the current day.
///
/// Exactly one state is active at a time. It is owned by the control loop
/// and only changes on the consumer thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MedicationState {
    /// Too early to bother anybody.
    Unmedicated,
    /// Inside the soft reminder window.
    SoftReminder,
    /// Outside both configured windows: take your pills.
    HardReminder,
    /// Reminder deferred until the snooze window expires.
    Snooze,
    /// Taken for today. Sticky until the ok button or a new day.
    NailedIt,
}

impl MedicationState {
    /// Snooze is honoured only while a reminder is showing (or already snoozed).
    pub fn is_snoozable(self) -> bool {
        matches!(
            self,
            MedicationState::Snooze | MedicationState::SoftReminder | MedicationState::HardReminder
        )
    }
}

impl fmt::Display for MedicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MedicationState::Unmedicated => "UNMEDICATED",
            MedicationState::SoftReminder => "SOFT_REMINDER",
            MedicationState::HardReminder => "HARD_REMINDER",
            MedicationState::Snooze => "SNOOZE",
            MedicationState::NailedIt => "NAILED_IT",
        };
        f.write_str(name)
    }
}
