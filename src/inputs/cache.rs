//! cache.rs
//! Latest sensor snapshot, shared between the sampler task (writer) and the
//! command dispatcher (reader).
//!
//! One `parking_lot::Mutex` guards both the sampler handle and the stored
//! snapshot, so a refresh is a single critical section of one sample read and
//! readers never see a half-written snapshot.

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use parking_lot::Mutex;

use super::sensor::{SensorSampler, SensorSnapshot};

struct CacheInner<S> {
    sampler: S,
    /// `None` until the first refresh.
    snapshot: Option<SensorSnapshot>,
}

impl<S: SensorSampler> CacheInner<S> {
    fn refresh(&mut self) -> SensorSnapshot {
        let fresh = self.sampler.sample();
        self.snapshot = Some(fresh);
        fresh
    }
}

pub struct SensorCache<S> {
    inner: Mutex<CacheInner<S>>,
    synchronous: AtomicBool,
}

impl<S: SensorSampler> SensorCache<S> {
    pub fn new(sampler: S) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                sampler,
                snapshot: None,
            }),
            synchronous: AtomicBool::new(false),
        }
    }

    /// Samples once and replaces the stored snapshot.
    pub fn refresh(&self) {
        self.inner.lock().refresh();
    }

    /// Most recent snapshot; samples synchronously if nothing is stored yet
    /// or the cache runs without a sampler task.
    pub fn get(&self) -> SensorSnapshot {
        let mut inner = self.inner.lock();
        if self.synchronous.load(Ordering::Acquire) {
            return inner.refresh();
        }
        match inner.snapshot {
            Some(snapshot) => snapshot,
            None => inner.refresh(),
        }
    }

    pub fn is_populated(&self) -> bool {
        self.inner.lock().snapshot.is_some()
    }

    /// Degraded mode for when no sampler task is running: every `get()`
    /// reads the sensors itself.
    pub fn fallback_to_synchronous(&self) {
        if !self.synchronous.swap(true, Ordering::AcqRel) {
            warn!("[SensorCache] no sampler task; reads now sample synchronously");
        }
        self.refresh();
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous.load(Ordering::Acquire)
    }
}
