//! config.rs
//! Timing constants for the supervisor tasks and the host link settings.
//!
//! Nothing here is read from disk. `SupervisorConfig::default()` is the board's
//! stock timing; `main` only overrides it from startup arguments.

use std::time::Duration;

const DEFAULT_SAMPLE_PERIOD_MS: u64 = 10;
const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_WAKE_UP_MS: u64 = 2_000;
const DEFAULT_LINK_IDLE_SLEEP_MS: u64 = 10;

pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_READ_TIMEOUT_MS: u64 = 10;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Sensor sampler release period.
    pub sample_period: Duration,
    /// Window in which at least one header byte must arrive.
    pub watchdog_timeout: Duration,
    /// Quiescent time the speed controllers need before accepting throttle.
    pub wake_up_duration: Duration,
    /// Dispatcher back-off when the link has nothing to read.
    pub link_idle_sleep: Duration,
    /// Queue the start sequence at boot instead of staying suspended.
    pub arm_on_boot: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(DEFAULT_SAMPLE_PERIOD_MS),
            watchdog_timeout: Duration::from_millis(DEFAULT_WATCHDOG_TIMEOUT_MS),
            wake_up_duration: Duration::from_millis(DEFAULT_WAKE_UP_MS),
            link_idle_sleep: Duration::from_millis(DEFAULT_LINK_IDLE_SLEEP_MS),
            arm_on_boot: false,
        }
    }
}

impl SupervisorConfig {
    pub fn with_sample_period(mut self, period: Duration) -> Self {
        self.sample_period = period;
        self
    }

    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    pub fn with_wake_up_duration(mut self, duration: Duration) -> Self {
        self.wake_up_duration = duration;
        self
    }

    pub fn with_link_idle_sleep(mut self, sleep: Duration) -> Self {
        self.link_idle_sleep = sleep;
        self
    }

    pub fn with_arm_on_boot(mut self, arm: bool) -> Self {
        self.arm_on_boot = arm;
        self
    }
}

/// Serial connection to the host computer.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUD,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

impl LinkConfig {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            ..Self::default()
        }
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }
}
