//! sampler.rs
//! Periodic sampler task: refreshes the `SensorCache` on a fixed release schedule.
//! - SpinSleeper keeps the period steady (default 10 ms).
//! - A release that wakes up after its scheduled tick is an overrun; it is
//!   reported to telemetry and the schedule is re-anchored instead of bursting
//!   to catch up.

use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::debug;

use crate::error::{Error, Result};
use crate::inputs::cache::SensorCache;
use crate::inputs::sensor::SensorSampler;
use crate::utils::telemetry::{Telemetry, TelemetryEvent};

/// Overruns shorter than this are scheduler noise, not worth an event.
const OVERRUN_REPORT_US: u64 = 1_000;

pub struct SamplerTask<S> {
    cache: Arc<SensorCache<S>>,
    period: Duration,
    running: Arc<AtomicBool>,
    telemetry: Arc<Telemetry>,
}

impl<S: SensorSampler + 'static> SamplerTask<S> {
    pub fn new(
        cache: Arc<SensorCache<S>>,
        period: Duration,
        running: Arc<AtomicBool>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            cache,
            period,
            running,
            telemetry,
        }
    }

    /// Runs until the `running` flag clears.
    pub fn run(&self) {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_release = Instant::now();
        let mut ticks: u64 = 0;

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            } else {
                let late_us = now.duration_since(next_release).as_micros() as u64;
                if late_us > OVERRUN_REPORT_US {
                    self.telemetry
                        .record(TelemetryEvent::SampleOverrun { late_us });
                    next_release = now;
                }
            }

            self.cache.refresh();

            next_release += self.period;
            ticks += 1;
        }

        debug!("[Sampler] stopped after {} samples", ticks);
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("sampler".into())
            .spawn(move || self.run())
            .map_err(|source| Error::Spawn {
                task: "sampler",
                source,
            })
    }
}
