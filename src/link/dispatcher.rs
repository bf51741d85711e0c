//! dispatcher.rs
//! Command loop: reads one header byte at a time from the host link, moves the
//! implied payload, and calls into the supervisor and the sensor cache.
//!
//! - Nothing to read is the idle case, never an error.
//! - Every known header feeds the watchdog before it is acted on, whether or
//!   not the command ends up having an effect.
//! - Unknown headers are skipped: no watchdog feed, no response, no state change.
//! - Headers are handled strictly one after another; no payload decode overlaps.

use std::{
    io::{self, ErrorKind, Read, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::inputs::cache::SensorCache;
use crate::inputs::sensor::SensorSampler;
use crate::link::protocol::{Header, WRITE_PAYLOAD_LEN, decode_write};
use crate::outputs::actuator::ActuatorDriver;
use crate::outputs::supervisor::Supervisor;
use crate::utils::telemetry::{Telemetry, TelemetryEvent};
use crate::watchdog::Feeder;

const LINK_ERROR_BACKOFF_MS: u64 = 100;
/// Consecutive failed reads after which the link counts as lost.
pub const DEFAULT_LINK_ERROR_LIMIT: u32 = 50;

/// Outcome of one `poll_once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// No byte was available.
    Idle,
    /// A byte arrived that is not a known header.
    Ignored(u8),
    Handled(Header),
}

pub struct Dispatcher<L, D, S> {
    link: L,
    supervisor: Supervisor<D>,
    cache: Arc<SensorCache<S>>,
    feeder: Feeder,
    telemetry: Arc<Telemetry>,
    idle_sleep: Duration,
    link_error_limit: u32,
}

impl<L, D, S> Dispatcher<L, D, S>
where
    L: Read + Write,
    D: ActuatorDriver + 'static,
    S: SensorSampler,
{
    pub fn new(
        link: L,
        supervisor: Supervisor<D>,
        cache: Arc<SensorCache<S>>,
        feeder: Feeder,
        telemetry: Arc<Telemetry>,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            link,
            supervisor,
            cache,
            feeder,
            telemetry,
            idle_sleep,
            link_error_limit: DEFAULT_LINK_ERROR_LIMIT,
        }
    }

    /// Zero is treated as one: the first hard error ends the loop.
    pub fn with_link_error_limit(mut self, limit: u32) -> Self {
        self.link_error_limit = limit.max(1);
        self
    }

    /// Handles at most one header. Only link I/O failures are errors.
    pub fn poll_once(&mut self) -> Result<Poll> {
        let mut byte = [0u8; 1];
        match self.link.read(&mut byte) {
            Ok(0) => return Ok(Poll::Idle),
            Ok(_) => {}
            Err(e) if is_idle(&e) => return Ok(Poll::Idle),
            Err(e) => return Err(e.into()),
        }

        let Some(header) = Header::from_u8(byte[0]) else {
            trace!("[Dispatcher] ignoring byte 0x{:02X}", byte[0]);
            self.telemetry
                .record(TelemetryEvent::UnknownHeader { byte: byte[0] });
            return Ok(Poll::Ignored(byte[0]));
        };

        self.feeder.feed();
        self.execute(header)?;
        Ok(Poll::Handled(header))
    }

    fn execute(&mut self, header: Header) -> Result<()> {
        match header {
            Header::Write => {
                let mut payload = [0u8; WRITE_PAYLOAD_LEN];
                let received = read_payload(&mut self.link, &mut payload)?;
                if received < WRITE_PAYLOAD_LEN {
                    warn!(
                        "[Dispatcher] write payload truncated ({}/{} bytes), discarded",
                        received, WRITE_PAYLOAD_LEN
                    );
                    self.telemetry.record(TelemetryEvent::TruncatedPayload {
                        expected: WRITE_PAYLOAD_LEN,
                        received,
                    });
                    return Ok(());
                }
                self.supervisor.set_powers(&decode_write(&payload));
            }
            Header::ReadSensors => {
                let data = self.cache.get().packet_data();
                self.respond(&data)?;
            }
            Header::ReadState => {
                let state = self.supervisor.state();
                self.respond(&[state.as_byte()])?;
            }
            Header::Restart => {
                if self.supervisor.start().is_none() {
                    debug!("[Dispatcher] restart ignored, already initializing");
                }
            }
            Header::Suspend => {
                self.supervisor.suspend();
            }
        }
        Ok(())
    }

    fn respond(&mut self, data: &[u8]) -> Result<()> {
        self.link.write_all(data)?;
        self.link.flush()?;
        Ok(())
    }

    /// Polls until the `running` flag clears or the link fails
    /// `link_error_limit` times in a row. Either way `running` is cleared on
    /// return so the other tasks wind down; a lost link returns its last error.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        info!("[Dispatcher] command loop started");
        let mut consecutive_errors = 0u32;
        let outcome = loop {
            if !running.load(Ordering::Acquire) {
                break Ok(());
            }
            match self.poll_once() {
                Ok(Poll::Idle) => {
                    consecutive_errors = 0;
                    thread::sleep(self.idle_sleep);
                }
                Ok(_) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    error!(
                        "[Dispatcher] link error ({}/{}): {}",
                        consecutive_errors, self.link_error_limit, e
                    );
                    self.telemetry.record(TelemetryEvent::LinkError);
                    if consecutive_errors >= self.link_error_limit {
                        break Err(e);
                    }
                    thread::sleep(Duration::from_millis(LINK_ERROR_BACKOFF_MS));
                }
            }
        };
        running.store(false, Ordering::Release);
        info!("[Dispatcher] command loop stopped");
        outcome
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Fills `buf` as far as the link allows; returns how many bytes arrived.
fn read_payload<R: Read>(link: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match link.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_idle(&e) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
