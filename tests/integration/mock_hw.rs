//! Mock hardware adapters for integration tests.
//!
//! The actuator records every driver call so tests can assert on the exact
//! power sequence; the host link is a shared byte pipe the test writes into
//! while the dispatcher runs on its own thread.

use parking_lot::Mutex;
use propulsion_supervisor::{
    PulseCommand, SensorSnapshot,
    inputs::sensor::SensorSampler,
    outputs::actuator::ActuatorDriver,
};
use std::{
    collections::VecDeque,
    io::{self, ErrorKind, Read, Write},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Activate,
    Deactivate,
    BeginWakeUp,
    FinishWakeUp,
    SetPowers(PulseCommand),
}

// ── RecordingActuator ─────────────────────────────────────────

#[derive(Default)]
pub struct RecordingActuator {
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn powered(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Activate => Some(true),
                ActuatorCall::Deactivate => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn last_powers(&self) -> Option<PulseCommand> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::SetPowers(cmd) => Some(*cmd),
            _ => None,
        })
    }
}

impl ActuatorDriver for RecordingActuator {
    fn activate(&mut self) {
        self.calls.push(ActuatorCall::Activate);
    }

    fn deactivate(&mut self) {
        self.calls.push(ActuatorCall::Deactivate);
    }

    fn begin_wake_up(&mut self) {
        self.calls.push(ActuatorCall::BeginWakeUp);
    }

    fn finish_wake_up(&mut self) {
        self.calls.push(ActuatorCall::FinishWakeUp);
    }

    fn set_powers(&mut self, cmd: &PulseCommand) {
        self.calls.push(ActuatorCall::SetPowers(*cmd));
    }
}

// ── ScriptedSensors ───────────────────────────────────────────

/// Replays a fixed list of readings, repeating the last one.
pub struct ScriptedSensors {
    readings: VecDeque<SensorSnapshot>,
    last: SensorSnapshot,
}

#[allow(dead_code)]
impl ScriptedSensors {
    pub fn new(readings: impl IntoIterator<Item = SensorSnapshot>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: SensorSnapshot::default(),
        }
    }
}

impl SensorSampler for ScriptedSensors {
    fn sample(&mut self) -> SensorSnapshot {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

// ── HostLink ──────────────────────────────────────────────────

#[derive(Default)]
struct Pipe {
    to_board: VecDeque<u8>,
    to_host: Vec<u8>,
}

/// Board end of an in-memory serial line. Clones share the same pipe, so the
/// test keeps one as the host end.
#[derive(Clone, Default)]
pub struct HostLink {
    pipe: Arc<Mutex<Pipe>>,
}

#[allow(dead_code)]
impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, bytes: &[u8]) {
        self.pipe.lock().to_board.extend(bytes.iter().copied());
    }

    /// Waits until `len` response bytes are available and takes them.
    pub fn receive(&self, len: usize, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut pipe = self.pipe.lock();
                if pipe.to_host.len() >= len {
                    return Some(pipe.to_host.drain(..len).collect());
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn pending_to_board(&self) -> usize {
        self.pipe.lock().to_board.len()
    }
}

impl Read for HostLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.pipe.lock();
        if pipe.to_board.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(pipe.to_board.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.to_board.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for HostLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pipe.lock().to_host.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
