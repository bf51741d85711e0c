//! supervisor.rs
//! Lifecycle state machine that gates every write to the propulsion outputs.
//!
//! ```text
//!              start()                    wake-up elapsed
//!  Suspended ──────────▶ Initializing ─────────────────────▶ Running
//!      ▲                      │  (commit only if still the same sequence)
//!      └──────── suspend() ───┴──────────────────────────────────┘
//! ```
//!
//! - One `parking_lot::Mutex` serialises the state, the start sequence number
//!   and the driver. Every transition is a single critical section.
//! - The multi-second wake-up wait runs on one long-lived worker thread with
//!   the lock released; only the commit re-takes it. A newer `start()`
//!   replaces the pending wait, so restarts never pile up threads.
//! - The commit is a compare-and-set on `(Initializing, sequence)`: a
//!   `suspend()` during wake-up wins, and a stale sequence from an earlier,
//!   suspended `start()` cannot promote a newer one early.
//! - `set_powers` while not `Running` is dropped silently. That is the arming
//!   policy, not a fault.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, after, bounded, select, unbounded};
use log::{debug, error, info};
use parking_lot::Mutex;

use crate::config::SupervisorConfig;
use crate::outputs::actuator::{ActuatorDriver, PulseCommand};
use crate::outputs::state::LifecycleState;
use crate::utils::telemetry::{Telemetry, TelemetryEvent};

struct Inner<D> {
    driver: D,
    state: LifecycleState,
    /// Bumped by every accepted `start()`.
    sequence: u64,
}

/// Cloneable handle; clones share one state machine and one driver.
pub struct Supervisor<D> {
    inner: Arc<Mutex<Inner<D>>>,
    wake_tx: Sender<WakeUpRequest>,
    wake_up_duration: Duration,
    telemetry: Arc<Telemetry>,
}

impl<D> Clone for Supervisor<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            wake_tx: self.wake_tx.clone(),
            wake_up_duration: self.wake_up_duration,
            telemetry: self.telemetry.clone(),
        }
    }
}

/// Completion signal of one wake-up sequence.
#[derive(Debug)]
pub struct WakeUp {
    done: Receiver<bool>,
}

impl WakeUp {
    /// Blocks until the sequence finishes. `true` if it committed to `Running`.
    pub fn wait(self) -> bool {
        self.done.recv().unwrap_or(false)
    }

    /// `None` if the sequence is still in its wake-up wait.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        match self.done.recv_timeout(timeout) {
            Ok(committed) => Some(committed),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(false),
        }
    }
}

impl<D: ActuatorDriver + 'static> Supervisor<D> {
    /// Takes ownership of the driver, puts it in the power-safe state and
    /// starts the wake-up worker.
    pub fn new(mut driver: D, config: &SupervisorConfig, telemetry: Arc<Telemetry>) -> Self {
        driver.reset();
        driver.deactivate();
        let inner = Arc::new(Mutex::new(Inner {
            driver,
            state: LifecycleState::Suspended,
            sequence: 0,
        }));

        let (wake_tx, wake_rx) = unbounded();
        let worker = WakeUpWorker {
            inner: inner.clone(),
            requests: wake_rx,
            telemetry: telemetry.clone(),
        };
        // on failure the receiver is dropped with the closure and every
        // later start() falls back to suspend
        if let Err(e) = thread::Builder::new()
            .name("wake-up".into())
            .spawn(move || worker.run())
        {
            error!("[Supervisor] failed to spawn wake-up worker: {}", e);
            telemetry.record(TelemetryEvent::TaskDegraded { task: "wake-up" });
        }

        Self {
            inner,
            wake_tx,
            wake_up_duration: config.wake_up_duration,
            telemetry,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Forwards the command to the driver only while `Running`.
    /// Returns whether it was applied.
    pub fn set_powers(&self, cmd: &PulseCommand) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Running {
            let state = inner.state;
            drop(inner);
            debug!("[Supervisor] write dropped while {}", state);
            self.telemetry.record(TelemetryEvent::WriteDropped { state });
            return false;
        }
        inner.driver.set_powers(cmd);
        true
    }

    /// Neutral outputs, `Suspended`, power-enable low, in that order.
    /// Safe to repeat. Returns the state it left.
    pub fn suspend(&self) -> LifecycleState {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.driver.reset();
            inner.state = LifecycleState::Suspended;
            inner.driver.deactivate();
            previous
        };
        if previous != LifecycleState::Suspended {
            self.announce(previous, LifecycleState::Suspended);
        }
        previous
    }

    /// Begins the power-up sequence. Ignored (returns `None`) while a sequence
    /// is already in flight.
    pub fn start(&self) -> Option<WakeUp> {
        let (previous, sequence) = {
            let mut inner = self.inner.lock();
            if inner.state == LifecycleState::Initializing {
                return None;
            }
            let previous = inner.state;
            inner.state = LifecycleState::Initializing;
            inner.sequence = inner.sequence.wrapping_add(1);
            inner.driver.reset();
            inner.driver.activate();
            inner.driver.begin_wake_up();
            (previous, inner.sequence)
        };
        self.announce(previous, LifecycleState::Initializing);

        let (done_tx, done_rx) = bounded(1);
        let request = WakeUpRequest {
            sequence,
            deadline: Instant::now() + self.wake_up_duration,
            done: done_tx,
        };
        if self.wake_tx.send(request).is_err() {
            error!("[Supervisor] wake-up worker unavailable, staying suspended");
            self.telemetry
                .record(TelemetryEvent::TaskDegraded { task: "wake-up" });
            self.suspend();
        }

        Some(WakeUp { done: done_rx })
    }

    /// Read-only access to the driver under the state lock.
    pub fn with_driver<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.inner.lock().driver)
    }

    fn announce(&self, from: LifecycleState, to: LifecycleState) {
        info!("[Supervisor] {} -> {}", from, to);
        self.telemetry.record(TelemetryEvent::StateChanged { from, to });
    }
}

struct WakeUpRequest {
    sequence: u64,
    deadline: Instant,
    done: Sender<bool>,
}

impl WakeUpRequest {
    fn finish(self, committed: bool) {
        // receiver may be gone; nobody is waiting then
        let _ = self.done.send(committed);
    }
}

/// Single long-lived thread that runs the wake-up wait for every `start()`.
/// At most one request is pending; a newer one supersedes it.
struct WakeUpWorker<D> {
    inner: Arc<Mutex<Inner<D>>>,
    requests: Receiver<WakeUpRequest>,
    telemetry: Arc<Telemetry>,
}

impl<D: ActuatorDriver> WakeUpWorker<D> {
    /// Exits once every supervisor handle is gone.
    fn run(self) {
        let mut pending: Option<WakeUpRequest> = None;
        loop {
            let Some(request) = pending.take() else {
                match self.requests.recv() {
                    Ok(request) => pending = Some(request),
                    Err(_) => break,
                }
                continue;
            };

            let remaining = request.deadline.saturating_duration_since(Instant::now());
            select! {
                recv(self.requests) -> msg => match msg {
                    Ok(newer) => {
                        debug!("[Supervisor] wake-up #{} superseded", request.sequence);
                        request.finish(false);
                        pending = Some(newer);
                    }
                    Err(_) => break,
                },
                recv(after(remaining)) -> _ => self.complete(request),
            }
        }
        debug!("[Supervisor] wake-up worker stopped");
    }

    fn complete(&self, request: WakeUpRequest) {
        let committed = commit_wake_up(&self.inner, request.sequence);
        if committed {
            info!("[Supervisor] {} -> {}", LifecycleState::Initializing, LifecycleState::Running);
            self.telemetry.record(TelemetryEvent::StateChanged {
                from: LifecycleState::Initializing,
                to: LifecycleState::Running,
            });
        } else {
            debug!("[Supervisor] wake-up #{} superseded", request.sequence);
        }
        request.finish(committed);
    }
}

fn commit_wake_up<D: ActuatorDriver>(inner: &Mutex<Inner<D>>, sequence: u64) -> bool {
    let mut inner = inner.lock();
    if inner.state != LifecycleState::Initializing || inner.sequence != sequence {
        return false;
    }
    inner.driver.finish_wake_up();
    inner.state = LifecycleState::Running;
    true
}
