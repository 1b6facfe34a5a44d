//! # Serial Link
//!
//! Frame-level transport over any byte stream. The port is split into two
//! handles on open: a [`FrameReader`] owned by the serial reader thread and a
//! [`FrameWriter`] owned by the control loop. Reads and writes therefore never
//! share a thread, and no lock is held around the port.
//!
//! A read that collects fewer than [`FRAME_SIZE`] bytes before the port's
//! timeout is not an error: the partial bytes are discarded and the caller
//! sees [`ReadOutcome::Timeout`]. A read returning zero bytes is end of
//! stream and surfaces as [`LinkError::Io`] with `UnexpectedEof`.

use crate::config::LinkConfig;
use crate::protocol::{Frame, FRAME_SIZE};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Transport failures.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Port could not be opened at startup (fatal)
    #[error("cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Read or write failed on an open port
    #[error("serial I/O: {0}")]
    Io(#[from] io::Error),
}

/// Result of one blocking read attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame(Frame),
    /// Nothing (or only part of a frame) arrived in time
    Timeout,
}

/// Reads whole frames from a byte stream with a finite read timeout.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader { inner }
    }

    pub fn read_frame(&mut self) -> Result<ReadOutcome, LinkError> {
        let mut frame = [0u8; FRAME_SIZE];
        let mut filled = 0;
        while filled < FRAME_SIZE {
            match self.inner.read(&mut frame[filled..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Ok(ReadOutcome::Timeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReadOutcome::Frame(frame))
    }
}

/// Outbound half of the link. Only the control loop holds one.
pub trait FrameSink: Send {
    fn send(&mut self, frame: &Frame) -> Result<(), LinkError>;

    /// `false` once the device is known to be gone.
    fn is_open(&self) -> bool {
        true
    }
}

/// Writes whole frames to a byte stream.
pub struct FrameWriter<W> {
    inner: W,
    open: bool,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        FrameWriter { inner, open: true }
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write + Send> FrameSink for FrameWriter<W> {
    fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let result = self
            .inner
            .write_all(frame)
            .and_then(|()| self.inner.flush());
        if let Err(e) = &result {
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
            ) {
                self.open = false;
            }
        }
        result.map_err(LinkError::from)
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

pub type PortReader = FrameReader<Box<dyn SerialPort>>;
pub type PortWriter = FrameWriter<Box<dyn SerialPort>>;

/// Open the configured port and split it into reader and writer halves.
pub fn open(config: &LinkConfig) -> Result<(PortReader, PortWriter), LinkError> {
    let open_error = |source: serialport::Error| LinkError::Open {
        port: config.port.clone(),
        source,
    };
    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.read_timeout)
        .open()
        .map_err(open_error)?;
    let reader = port.try_clone().map_err(open_error)?;
    Ok((FrameReader::new(reader), FrameWriter::new(port)))
}
