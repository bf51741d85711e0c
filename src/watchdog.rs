//! watchdog.rs
//! Host liveness watchdog.
//!
//! The dispatcher feeds a bounded(1) channel on every accepted header byte.
//! Once per timeout window the watchdog drains it; an empty channel means the
//! host went quiet and the supervisor is forced to `Suspended`. Level-triggered:
//! every missed window suspends again, and the next fed window re-arms it.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{Receiver, Sender, bounded, tick};
use log::{debug, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::error::{Error, Result};
use crate::outputs::actuator::ActuatorDriver;
use crate::outputs::state::LifecycleState;
use crate::outputs::supervisor::Supervisor;
use crate::utils::telemetry::{Telemetry, TelemetryEvent};

/// Dispatcher-side handle. Feeding never blocks.
#[derive(Clone)]
pub struct Feeder {
    tx: Sender<()>,
}

impl Feeder {
    #[inline]
    pub fn feed(&self) {
        // full means already fed this window
        let _ = self.tx.try_send(());
    }
}

pub struct Watchdog<D> {
    supervisor: Supervisor<D>,
    fed: Receiver<()>,
    timeout: Duration,
    telemetry: Arc<Telemetry>,
}

impl<D: ActuatorDriver + 'static> Watchdog<D> {
    pub fn new(
        supervisor: Supervisor<D>,
        timeout: Duration,
        telemetry: Arc<Telemetry>,
    ) -> (Self, Feeder) {
        let (tx, rx) = bounded(1);
        (
            Self {
                supervisor,
                fed: rx,
                timeout,
                telemetry,
            },
            Feeder { tx },
        )
    }

    /// One read-and-clear cycle. Returns whether the window was fed.
    pub fn check(&self) -> bool {
        let fed = self.fed.try_iter().count() > 0;
        if !fed {
            let previous = self.supervisor.suspend();
            if previous != LifecycleState::Suspended {
                warn!(
                    "[Watchdog] no command for {:?} while {}, suspending",
                    self.timeout, previous
                );
                self.telemetry.record(TelemetryEvent::WatchdogTimeout);
            }
        }
        fed
    }

    /// Checks once per timeout window until the `running` flag clears.
    pub fn run(&self, running: &AtomicBool) {
        let ticker = tick(self.timeout);
        while running.load(Ordering::Acquire) {
            if ticker.recv().is_err() {
                break;
            }
            if !running.load(Ordering::Acquire) {
                break;
            }
            self.check();
        }
        debug!("[Watchdog] stopped");
    }

    /// Spawns the periodic task at the highest OS priority available.
    pub fn spawn(self, running: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("watchdog".into())
            .spawn_with_priority(ThreadPriority::Max, move |priority| {
                if let Err(e) = priority {
                    warn!("[Watchdog] running at default priority: {:?}", e);
                }
                self.run(&running);
            })
            .map_err(|source| Error::Spawn {
                task: "watchdog",
                source,
            })
    }
}
