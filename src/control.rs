//! # Control Loop
//!
//! The single consumer. It drains the [`EventQueue`] in FIFO order, owns the
//! [`Tracker`] and is the only code that writes to the serial link.
//!
//! | event                  | action |
//! |------------------------|--------|
//! | `Exit`                 | clear the alive flag, wake everybody, stop |
//! | `Heartbeat`            | send the heartbeat request |
//! | `State`, `DeviceBoot`  | advance the schedule, send set LED |
//! | `DeviceButton`         | apply ok/snooze, enqueue a follow-up `State` |
//! | `DeviceHeartbeatAck`   | log only |
//! | `DeviceStateAck`       | nothing |

use crate::config::Config;
use crate::event_queue::{EventQueue, Lifecycle};
use crate::protocol::{ButtonPress, Event, LedCommand, ALL_PIXELS, HEARTBEAT_REQUEST};
use crate::schedule::{Clock, Tracker};
use crate::serial_link::{FrameSink, LinkError};
use crate::MedicationState;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the loop should do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct ControlLoop<S, C> {
    config: Config,
    sink: S,
    clock: C,
    tracker: Tracker,
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    link_lost: bool,
}

impl<S: FrameSink, C: Clock> ControlLoop<S, C> {
    /// Start the day in UNMEDICATED; the first `State` event places it.
    pub fn new(
        config: Config,
        sink: S,
        clock: C,
        queue: Arc<EventQueue>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        let tracker = Tracker::new(clock.now().date());
        ControlLoop {
            config,
            sink,
            clock,
            tracker,
            queue,
            lifecycle,
            link_lost: false,
        }
    }

    pub fn state(&self) -> MedicationState {
        self.tracker.state()
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Set LED request for the current state.
    pub fn led_command(&self) -> LedCommand {
        let style = self.config.styles.style_for(self.tracker.state());
        LedCommand {
            brightness: style.brightness,
            pixel_mask: ALL_PIXELS,
            color: style.color,
            off_ms: self.config.blink.off_ms,
            on_ms: self.config.blink.on_ms,
        }
    }

    /// Consume events until EXIT is processed or shutdown is broadcast.
    ///
    /// Write failures are logged and the loop carries on. Losing the link is
    /// reported once.
    pub fn run(&mut self) {
        info!("control loop started");
        while self.lifecycle.is_alive() {
            let Some(event) = self.queue.pop(self.config.intervals.control) else {
                continue;
            };
            match self.dispatch(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => warn!(event = event.name(), error = %e, "dispatch failed"),
            }
            self.check_link();
        }
        info!("control loop stopped");
    }

    /// Handle one event.
    pub fn dispatch(&mut self, event: Event) -> Result<Flow, LinkError> {
        debug!(event = event.name(), state = %self.tracker.state(), "dispatch");
        match event {
            Event::Exit => {
                info!("exit requested, shutting down");
                self.lifecycle.broadcast_shutdown(&self.queue);
                return Ok(Flow::Stop);
            }
            Event::Heartbeat => self.sink.send(&HEARTBEAT_REQUEST)?,
            Event::State | Event::DeviceBoot => {
                self.refresh_by_time();
                self.send_led()?;
            }
            Event::DeviceButton(press) => self.handle_buttons(press),
            Event::DeviceHeartbeatAck(report) => {
                debug!(
                    brightness = report.brightness,
                    vitaminder = %report.vitaminder,
                    system = %report.system,
                    "heartbeat response"
                );
            }
            Event::DeviceStateAck => {}
        }
        Ok(Flow::Continue)
    }

    fn check_link(&mut self) {
        let open = self.sink.is_open();
        if !open && !self.link_lost {
            error!("serial link closed, device writes will keep failing");
        } else if open && self.link_lost {
            info!("serial link back");
        }
        self.link_lost = !open;
    }

    fn refresh_by_time(&mut self) {
        let now = self.clock.now();
        let before = self.tracker.state();
        let rolled_over = self.tracker.day() != now.date();
        if self.tracker.update_by_time(now, &self.config.schedule) {
            info!(from = %before, to = %self.tracker.state(), "state changed");
        }
        if rolled_over {
            info!(day = %self.tracker.day(), "new day");
        }
    }

    /// Snooze wins when both buttons are down, even when it is ignored.
    fn handle_buttons(&mut self, press: ButtonPress) {
        let now = self.clock.now();
        let before = self.tracker.state();
        if press.snooze {
            if self.tracker.press_snooze(now, self.config.snooze) {
                info!(from = %before, until = ?self.tracker.snooze_until(), "snoozed");
            } else {
                debug!(state = %before, "snooze ignored");
            }
        } else if press.ok {
            self.tracker.press_ok(now, &self.config.schedule);
            info!(from = %before, to = %self.tracker.state(), "ok pressed");
        }
        self.queue.push(Event::State);
    }

    fn send_led(&mut self) -> Result<(), LinkError> {
        let cmd = self.led_command();
        self.sink.send(&cmd.encode())
    }
}
