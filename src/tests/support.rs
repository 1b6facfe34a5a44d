//! Test doubles: a settable clock and an in-memory frame sink.

use crate::protocol::Frame;
use crate::schedule::Clock;
use crate::serial_link::{FrameSink, LinkError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 2024-03-14 at `h:m`.
pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 14)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        ManualClock(Arc::new(Mutex::new(now)))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

/// Records every frame sent. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    /// Make subsequent sends fail with a broken pipe and report the link
    /// closed.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl FrameSink for RecordingSink {
    fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        self.frames.lock().unwrap().push(*frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}
