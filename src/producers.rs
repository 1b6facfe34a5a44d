//! # Producer Threads
//!
//! Each producer is returned as a closure ready for `thread::spawn`. They only
//! push [`Event`]s; none of them touches the medication state or writes to
//! the port. All of them check [`Lifecycle::is_alive`] before every iteration
//! and sleep through [`Lifecycle::sleep`] so a shutdown broadcast ends them
//! within one wake cycle.

use crate::event_queue::{EventQueue, Lifecycle};
use crate::protocol::Event;
use crate::serial_link::{FrameReader, ReadOutcome};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Enqueue a STATE tick every `interval`, starting immediately.
pub fn time_updater(
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    interval: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        while lifecycle.is_alive() {
            queue.push(Event::State);
            lifecycle.sleep(interval);
        }
        debug!("time updater stopped");
    }
}

/// Enqueue a HEARTBEAT every `interval`, starting immediately.
pub fn heartbeat_ticker(
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    interval: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        while lifecycle.is_alive() {
            queue.push(Event::Heartbeat);
            lifecycle.sleep(interval);
        }
        debug!("heartbeat ticker stopped");
    }
}

/// Turn inbound frames into device events.
///
/// Timeouts and short reads just loop. Unknown message ids are dropped. A
/// hard read error or end of stream is logged and retried after
/// `error_pause`.
pub fn serial_reader<R: Read + Send + 'static>(
    mut reader: FrameReader<R>,
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    error_pause: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        while lifecycle.is_alive() {
            match reader.read_frame() {
                Ok(ReadOutcome::Timeout) => {}
                Ok(ReadOutcome::Frame(frame)) => match Event::from_frame(&frame) {
                    Some(event) => {
                        debug!(event = event.name(), "frame received");
                        queue.push(event);
                    }
                    None => debug!(id = frame[0], "dropping unknown frame"),
                },
                Err(e) => {
                    error!(error = %e, "serial read failed");
                    lifecycle.sleep(error_pause);
                }
            }
        }
        debug!("serial reader stopped");
    }
}

/// Enqueue EXIT once `after` has passed, unless shutdown came first.
pub fn shutdown_timer(
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    after: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        if lifecycle.sleep(after) {
            info!(after_secs = after.as_secs(), "run time elapsed, requesting exit");
            queue.push(Event::Exit);
        }
    }
}
