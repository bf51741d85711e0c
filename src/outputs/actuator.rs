//! actuator.rs
//! Propulsion outputs: one power-enable line, four thruster speed-controller
//! channels and four steering-servo channels, all driven by pulse width.
//!
//! `ActuatorDriver` is the seam to the board's timers; the supervisor owns one
//! and is the only caller. `VirtualActuator` keeps the same state in memory
//! for hosts without the board and for tests.

use log::{debug, trace};

pub const THRUSTER_NUM: usize = 4;
/// Pulse width written to every channel by `reset()`.
pub const NEUTRAL_PULSE_US: u16 = 0;
/// Minimum thruster pulse once the speed controllers are awake.
pub const WAKE_UP_PULSE_US: u16 = 100;
/// PWM frame period of every channel.
pub const PWM_PERIOD_MS: u16 = 20;

/// Pulse widths for every channel, `(thruster_us, servo_us)` per index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseCommand(pub [(u16, u16); THRUSTER_NUM]);

impl PulseCommand {
    pub const NEUTRAL: PulseCommand = PulseCommand([(NEUTRAL_PULSE_US, NEUTRAL_PULSE_US); THRUSTER_NUM]);

    pub fn new(pairs: [(u16, u16); THRUSTER_NUM]) -> Self {
        Self(pairs)
    }

    #[inline]
    pub fn thruster(&self, channel: usize) -> u16 {
        self.0[channel].0
    }

    #[inline]
    pub fn servo(&self, channel: usize) -> u16 {
        self.0[channel].1
    }

    pub fn pairs(&self) -> &[(u16, u16); THRUSTER_NUM] {
        &self.0
    }
}

/// Raw output driver. Hardware faults are out of scope here: every call succeeds.
pub trait ActuatorDriver: Send {
    /// Drive the power-enable line high.
    fn activate(&mut self);
    /// Drive the power-enable line low.
    fn deactivate(&mut self);
    /// Hold the thrusters quiescent while the speed controllers boot.
    fn begin_wake_up(&mut self);
    /// Put every thruster at the minimum non-zero pulse.
    fn finish_wake_up(&mut self);
    fn set_powers(&mut self, cmd: &PulseCommand);
    /// All channels back to neutral.
    fn reset(&mut self) {
        self.set_powers(&PulseCommand::NEUTRAL);
    }
}

impl<D: ActuatorDriver + ?Sized> ActuatorDriver for Box<D> {
    fn activate(&mut self) {
        (**self).activate()
    }

    fn deactivate(&mut self) {
        (**self).deactivate()
    }

    fn begin_wake_up(&mut self) {
        (**self).begin_wake_up()
    }

    fn finish_wake_up(&mut self) {
        (**self).finish_wake_up()
    }

    fn set_powers(&mut self, cmd: &PulseCommand) {
        (**self).set_powers(cmd)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// In-memory board outputs with read-back.
#[derive(Debug, Clone)]
pub struct VirtualActuator {
    powered: bool,
    pulses: PulseCommand,
}

impl Default for VirtualActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualActuator {
    pub fn new() -> Self {
        Self {
            powered: false,
            pulses: PulseCommand::NEUTRAL,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn pulse_widths(&self) -> PulseCommand {
        self.pulses
    }
}

impl ActuatorDriver for VirtualActuator {
    fn activate(&mut self) {
        self.powered = true;
        debug!("[Actuator] power enable high, {} ms pulse period", PWM_PERIOD_MS);
    }

    fn deactivate(&mut self) {
        self.powered = false;
        debug!("[Actuator] power enable low");
    }

    fn begin_wake_up(&mut self) {
        for pair in self.pulses.0.iter_mut() {
            pair.0 = NEUTRAL_PULSE_US;
        }
    }

    fn finish_wake_up(&mut self) {
        for pair in self.pulses.0.iter_mut() {
            pair.0 = WAKE_UP_PULSE_US;
        }
        debug!("[Actuator] thrusters at wake-up pulse {}us", WAKE_UP_PULSE_US);
    }

    fn set_powers(&mut self, cmd: &PulseCommand) {
        self.pulses = *cmd;
        trace!("[Actuator] pulses {:?}", cmd.pairs());
    }
}
