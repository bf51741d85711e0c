//! telemetry.rs
//! Operator-visible event channel for the supervisor.
//!
//! - Producers (dispatcher, supervisor, sampler, watchdog) call `record()`,
//!   which never blocks: a bounded `ArrayQueue` takes the event or it is
//!   dropped and counted.
//! - Per-kind atomic counters are always updated, even when the queue is full.
//! - An optional consumer thread drains the queue into a CSV file in batches.

use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::outputs::state::LifecycleState;

const QUEUE_CAPACITY: usize = 4096;
const CONSUMER_POLL_MS: u64 = 20;
const FLUSH_BATCHES: usize = 8;
const BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    StateChanged { from: LifecycleState, to: LifecycleState },
    WatchdogTimeout,
    WriteDropped { state: LifecycleState },
    UnknownHeader { byte: u8 },
    TruncatedPayload { expected: usize, received: usize },
    SampleOverrun { late_us: u64 },
    TaskDegraded { task: &'static str },
    LinkError,
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::WatchdogTimeout => "watchdog_timeout",
            Self::WriteDropped { .. } => "write_dropped",
            Self::UnknownHeader { .. } => "unknown_header",
            Self::TruncatedPayload { .. } => "truncated_payload",
            Self::SampleOverrun { .. } => "sample_overrun",
            Self::TaskDegraded { .. } => "task_degraded",
            Self::LinkError => "link_error",
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::StateChanged { from, to } => format!("{}->{}", from, to),
            Self::WriteDropped { state } => state.to_string(),
            Self::UnknownHeader { byte } => format!("0x{:02X}", byte),
            Self::TruncatedPayload { expected, received } => {
                format!("{}/{}", received, expected)
            }
            Self::SampleOverrun { late_us } => format!("{}us", late_us),
            Self::TaskDegraded { task } => task.to_string(),
            Self::WatchdogTimeout | Self::LinkError => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RawEvent {
    seq: u64,
    ts: Instant,
    event: TelemetryEvent,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    seq: u64,
    age_us: u64,
    event: &'static str,
    detail: String,
}

impl From<RawEvent> for CsvRow {
    fn from(raw: RawEvent) -> Self {
        Self {
            seq: raw.seq,
            age_us: raw.ts.elapsed().as_micros() as u64,
            event: raw.event.name(),
            detail: raw.event.detail(),
        }
    }
}

/// Snapshot of the per-kind counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryCounters {
    pub state_changes: u64,
    pub watchdog_timeouts: u64,
    pub writes_dropped: u64,
    pub unknown_headers: u64,
    pub truncated_payloads: u64,
    pub sample_overruns: u64,
    pub degraded_tasks: u64,
    pub link_errors: u64,
    /// Events that did not fit in the queue.
    pub dropped_events: u64,
}

#[derive(Default)]
struct Counters {
    state_changes: AtomicU64,
    watchdog_timeouts: AtomicU64,
    writes_dropped: AtomicU64,
    unknown_headers: AtomicU64,
    truncated_payloads: AtomicU64,
    sample_overruns: AtomicU64,
    degraded_tasks: AtomicU64,
    link_errors: AtomicU64,
    dropped_events: AtomicU64,
}

impl Counters {
    fn slot(&self, event: &TelemetryEvent) -> &AtomicU64 {
        match event {
            TelemetryEvent::StateChanged { .. } => &self.state_changes,
            TelemetryEvent::WatchdogTimeout => &self.watchdog_timeouts,
            TelemetryEvent::WriteDropped { .. } => &self.writes_dropped,
            TelemetryEvent::UnknownHeader { .. } => &self.unknown_headers,
            TelemetryEvent::TruncatedPayload { .. } => &self.truncated_payloads,
            TelemetryEvent::SampleOverrun { .. } => &self.sample_overruns,
            TelemetryEvent::TaskDegraded { .. } => &self.degraded_tasks,
            TelemetryEvent::LinkError => &self.link_errors,
        }
    }
}

pub struct Telemetry {
    queue: Arc<ArrayQueue<RawEvent>>,
    counters: Counters,
    seq_counter: AtomicU64,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
    consumer_running: Arc<AtomicBool>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(QUEUE_CAPACITY)),
            counters: Counters::default(),
            seq_counter: AtomicU64::new(1),
            consumer_handle: Mutex::new(None),
            consumer_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking. Counts the event, then queues it if there is room.
    pub fn record(&self, event: TelemetryEvent) {
        self.counters.slot(&event).fetch_add(1, Ordering::Relaxed);

        let raw = RawEvent {
            seq: self.seq_counter.fetch_add(1, Ordering::Relaxed),
            ts: Instant::now(),
            event,
        };
        if self.queue.push(raw).is_err() {
            self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn counters(&self) -> TelemetryCounters {
        let c = &self.counters;
        TelemetryCounters {
            state_changes: c.state_changes.load(Ordering::Relaxed),
            watchdog_timeouts: c.watchdog_timeouts.load(Ordering::Relaxed),
            writes_dropped: c.writes_dropped.load(Ordering::Relaxed),
            unknown_headers: c.unknown_headers.load(Ordering::Relaxed),
            truncated_payloads: c.truncated_payloads.load(Ordering::Relaxed),
            sample_overruns: c.sample_overruns.load(Ordering::Relaxed),
            degraded_tasks: c.degraded_tasks.load(Ordering::Relaxed),
            link_errors: c.link_errors.load(Ordering::Relaxed),
            dropped_events: c.dropped_events.load(Ordering::Relaxed),
        }
    }

    /// Pops every queued event in record order.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(raw) = self.queue.pop() {
            out.push(raw.event);
        }
        out
    }

    /// Starts the background CSV writer. A second call while one is running is a no-op.
    pub fn start_consumer(&self, output_csv: PathBuf) -> Result<()> {
        let mut guard = self.consumer_handle.lock();
        if guard.is_some() {
            warn!("[Telemetry] consumer already running");
            return Ok(());
        }

        let file = File::create(&output_csv)?;
        let queue = self.queue.clone();
        let running = self.consumer_running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("telemetry".into())
            .spawn(move || {
                let mut wtr = Writer::from_writer(BufWriter::new(file));
                let mut flush_counter = 0usize;

                while running.load(Ordering::SeqCst) {
                    let mut any = false;
                    for _ in 0..BATCH_SIZE {
                        match queue.pop() {
                            Some(raw) => {
                                any = true;
                                write_row(&mut wtr, raw);
                            }
                            None => break,
                        }
                    }
                    if any {
                        flush_counter += 1;
                        if flush_counter >= FLUSH_BATCHES {
                            wtr.flush().ok();
                            flush_counter = 0;
                        }
                    } else {
                        thread::sleep(Duration::from_millis(CONSUMER_POLL_MS));
                    }
                }

                // Final drain
                while let Some(raw) = queue.pop() {
                    write_row(&mut wtr, raw);
                }
                wtr.flush().ok();
                debug!("[Telemetry::consumer] exiting");
            })
            .map_err(|source| {
                self.consumer_running.store(false, Ordering::SeqCst);
                Error::Spawn {
                    task: "telemetry",
                    source,
                }
            })?;

        *guard = Some(handle);
        Ok(())
    }

    /// Stops the CSV writer after it has drained and flushed the queue.
    pub fn stop_consumer(&self) {
        self.consumer_running.store(false, Ordering::SeqCst);
        let handle = self.consumer_handle.lock().take();
        if let Some(h) = handle {
            if h.join().is_err() {
                error!("[Telemetry] consumer thread panicked");
            }
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        self.stop_consumer();
    }
}

fn write_row<W: std::io::Write>(wtr: &mut Writer<W>, raw: RawEvent) {
    if let Err(e) = wtr.serialize(CsvRow::from(raw)) {
        error!("[Telemetry::consumer] csv write failed: {}", e);
    }
}
