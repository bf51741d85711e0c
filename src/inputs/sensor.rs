//! sensor.rs
//! Raw analog inputs: two flex sensors, supply current and supply voltage.
//! - `SensorSampler` is the seam to the board's ADC; the core never calibrates values.
//! - `SimulatedSensors` stands in for the ADC on a host without the board attached.

use rand::random_range;

/// Encoded size of a snapshot on the link.
pub const SNAPSHOT_LEN: usize = 8;

/// One reading of every channel, in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSnapshot {
    pub flex1: u16,
    pub flex2: u16,
    pub current: u16,
    pub voltage: u16,
}

impl SensorSnapshot {
    pub const fn new(flex1: u16, flex2: u16, current: u16, voltage: u16) -> Self {
        Self {
            flex1,
            flex2,
            current,
            voltage,
        }
    }

    /// Wire form: flex1, flex2, current, voltage, each little-endian.
    pub fn packet_data(&self) -> [u8; SNAPSHOT_LEN] {
        let mut out = [0u8; SNAPSHOT_LEN];
        for (chunk, value) in out
            .chunks_exact_mut(2)
            .zip([self.flex1, self.flex2, self.current, self.voltage])
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Reads every analog channel once. Assumed infallible at this layer.
pub trait SensorSampler: Send {
    fn sample(&mut self) -> SensorSnapshot;
}

impl<S: SensorSampler + ?Sized> SensorSampler for Box<S> {
    fn sample(&mut self) -> SensorSnapshot {
        (**self).sample()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Flex1,
    Flex2,
    Current,
    Voltage,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 4] = [
        SensorChannel::Flex1,
        SensorChannel::Flex2,
        SensorChannel::Current,
        SensorChannel::Voltage,
    ];

    /// Resting raw value of the channel on the bench.
    pub fn base_value(&self) -> u16 {
        match self {
            SensorChannel::Flex1 => 0xF001,
            SensorChannel::Flex2 => 0xF020,
            SensorChannel::Current => 0x0CAE,
            SensorChannel::Voltage => 0xAE00,
        }
    }
}

/// Noisy readings around each channel's bench baseline.
#[derive(Debug, Clone)]
pub struct SimulatedSensors {
    noise: i32,
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SimulatedSensors {
    /// `noise` is the maximum absolute deviation in raw counts.
    pub fn new(noise: u16) -> Self {
        Self {
            noise: i32::from(noise),
        }
    }

    fn read(&self, channel: SensorChannel) -> u16 {
        let base = i32::from(channel.base_value());
        let offset = if self.noise == 0 {
            0
        } else {
            random_range(-self.noise..=self.noise)
        };
        (base + offset).clamp(0, i32::from(u16::MAX)) as u16
    }
}

impl SensorSampler for SimulatedSensors {
    fn sample(&mut self) -> SensorSnapshot {
        let [flex1, flex2, current, voltage] = SensorChannel::ALL.map(|c| self.read(c));
        SensorSnapshot::new(flex1, flex2, current, voltage)
    }
}
