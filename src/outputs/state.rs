//! Lifecycle state of the propulsion outputs.

use std::fmt;

/// Wire encoding is the discriminant: `Initializing=0, Suspended=1, Running=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Speed controllers are waking up; writes are still dropped.
    Initializing = 0,
    /// Power-safe: outputs neutral, power-enable low.
    Suspended = 1,
    /// Armed: pulse-width writes reach the driver.
    Running = 2,
}

impl LifecycleState {
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Initializing),
            1 => Some(Self::Suspended),
            2 => Some(Self::Running),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Suspended => "suspended",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
