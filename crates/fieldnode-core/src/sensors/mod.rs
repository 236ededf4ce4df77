//! Sensor readers for the node's on-board peripherals

mod climate;
mod light;

pub use climate::*;
pub use light::*;

use core::fmt;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} device is not ready")]
    NotReady { sensor: &'static str },
    #[error("{sensor} {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Reading;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Reading, SensorError>>;
}

/// Fixed-point sensor value: `val1` is the integer part, `val2` the fractional
/// part in millionths. Both carry the sign of the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorValue {
    pub val1: i32,
    pub val2: i32,
}

impl SensorValue {
    pub const fn new(val1: i32, val2: i32) -> Self {
        Self { val1, val2 }
    }

    pub const fn from_milli(milli: i32) -> Self {
        Self {
            val1: milli / 1000,
            val2: (milli % 1000) * 1000,
        }
    }

    /// Value in thousandths, truncated toward zero
    pub const fn as_milli(self) -> i32 {
        self.val1 * 1000 + self.val2 / 1000
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.val1 < 0 || self.val2 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:06}",
            sign,
            self.val1.unsigned_abs(),
            self.val2.unsigned_abs()
        )
    }
}
