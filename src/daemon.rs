//! # Daemon Wiring
//!
//! Spawns the control loop and the producers on named OS threads around one
//! shared [`EventQueue`] and [`Lifecycle`]. The serial port halves come in
//! already opened, so the caller decides what a link is (a real port in
//! `main`, in-memory fakes in tests).

use crate::config::{Config, PollIntervals};
use crate::control::ControlLoop;
use crate::event_queue::{EventQueue, Lifecycle};
use crate::producers;
use crate::protocol::Event;
use crate::schedule::Clock;
use crate::serial_link::{FrameReader, FrameSink};
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// Running set of threads.
pub struct Daemon {
    queue: Arc<EventQueue>,
    lifecycle: Arc<Lifecycle>,
    threads: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Start the consumer first, then the producers.
    ///
    /// If a thread cannot be spawned the ones already running are shut down
    /// before the error is returned.
    pub fn start<R, S, C>(
        config: Config,
        reader: FrameReader<R>,
        sink: S,
        clock: C,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
        S: FrameSink + 'static,
        C: Clock + 'static,
    {
        let queue = Arc::new(EventQueue::new());
        let lifecycle = Arc::new(Lifecycle::new());
        let mut daemon = Daemon {
            queue: Arc::clone(&queue),
            lifecycle: Arc::clone(&lifecycle),
            threads: Vec::new(),
        };

        let intervals = config.intervals;
        let read_timeout = config.link.read_timeout;
        let control = ControlLoop::new(config, sink, clock, queue, lifecycle);

        let spawned = daemon.spawn_all(control, reader, intervals, read_timeout);
        if let Err(e) = spawned {
            daemon.lifecycle.broadcast_shutdown(&daemon.queue);
            daemon.join();
            return Err(e);
        }
        info!(threads = daemon.threads.len(), "daemon started");
        Ok(daemon)
    }

    fn spawn_all<R, S, C>(
        &mut self,
        mut control: ControlLoop<S, C>,
        reader: FrameReader<R>,
        intervals: PollIntervals,
        read_timeout: Duration,
    ) -> io::Result<()>
    where
        R: Read + Send + 'static,
        S: FrameSink + 'static,
        C: Clock + 'static,
    {
        let queue = Arc::clone(&self.queue);
        let lifecycle = Arc::clone(&self.lifecycle);

        self.spawn("control", move || control.run())?;
        self.spawn(
            "serial-reader",
            producers::serial_reader(reader, queue.clone(), lifecycle.clone(), read_timeout),
        )?;
        self.spawn(
            "heartbeat",
            producers::heartbeat_ticker(queue.clone(), lifecycle.clone(), intervals.heartbeat),
        )?;
        self.spawn(
            "time-updater",
            producers::time_updater(queue.clone(), lifecycle.clone(), intervals.time_update),
        )?;
        if let Some(after) = intervals.shutdown_after {
            self.spawn(
                "shutdown-timer",
                producers::shutdown_timer(queue, lifecycle, after),
            )?;
        }
        Ok(())
    }

    fn spawn<F>(&mut self, name: &str, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(f)?;
        self.threads.push(handle);
        Ok(())
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Ask the control loop to stop, the same way any other EXIT arrives.
    pub fn request_exit(&self) {
        self.queue.push(Event::Exit);
    }

    /// Wait for every thread to finish.
    pub fn join(self) {
        for handle in self.threads {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "thread panicked");
            }
        }
        info!("all threads stopped");
    }
}
