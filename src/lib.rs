use log::{debug, trace, warn};
use std::{error::Error, fmt, num::ParseIntError, str::FromStr};

pub mod cdev;
mod report;

#[cfg(test)]
mod sim;

pub use cdev::{CdevGpio, GpioError};
pub use report::{ReportError, report};

/// Trigger idle time before every ping. The sensor needs this much quiet
/// between two measurements.
pub const SETTLE_MILLIS: u64 = 50;
/// Width of the trigger pulse from the HC-SR04 datasheet.
pub const TRIGGER_PULSE_MICROS: u64 = 10;
/// 0.5 s, roughly 171 m of round trip.
pub const TIMEOUT_MICROS: u64 = 500_000;
/// Speed of sound (343 m/s) halved for the round trip, in cm per microsecond.
pub const CM_PER_MICROSEC: f64 = 0.017150;

#[derive(Debug, thiserror::Error)]
pub enum RangeError<E: Error + 'static> {
    /// No edge was seen on the echo line before the timeout. Covers both
    /// "nothing in range" and a stuck or disconnected echo line.
    #[error("Out of range")]
    OutOfRange,

    #[error("GPIO error: {0}")]
    Gpio(#[source] E),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pin number '{text}': {source}")]
pub struct PinParseError {
    text: String,
    source: ParseIntError,
}

/// GPIO line offset on the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(pub u32);

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

impl FromStr for Pin {
    type Err = PinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Pin)
            .map_err(|source| PinParseError { text: s.to_string(), source })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        if value == 0 { Level::Low } else { Level::High }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

/// Pin-level access the ranging routine needs from a GPIO backend.
pub trait GpioPins {
    type Error: Error + 'static;

    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<(), Self::Error>;

    fn write(&mut self, pin: Pin, level: Level) -> Result<(), Self::Error>;

    fn read(&mut self, pin: Pin) -> Result<Level, Self::Error>;
}

/// Microsecond clock plus blocking sleeps.
///
/// `micros` only has to be monotonic over a single measurement; its epoch is
/// irrelevant because every deadline is computed from a reading taken at the
/// start of the measurement.
pub trait Clock {
    fn micros(&mut self) -> u64;

    fn sleep_millis(&mut self, millis: u64);

    fn sleep_micros(&mut self, micros: u64);
}

/// Distance in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Distance(f64);

impl Distance {
    pub fn from_cm(cm: f64) -> Self {
        Distance(cm)
    }

    pub fn cm(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} cm", self.0)
    }
}

/// Converts the echo timestamps into centimeters.
pub fn distance_cm(ping_time: u64, pong_time: u64) -> f64 {
    pong_time.saturating_sub(ping_time) as f64 * CM_PER_MICROSEC
}

pub struct RangeSensor<G> {
    gpio: G,
}

impl<G> RangeSensor<G>
where
    G: GpioPins + Clock,
{
    pub fn new(gpio: G) -> Self {
        Self { gpio }
    }

    pub fn into_inner(self) -> G {
        self.gpio
    }

    /// Runs one trigger/echo cycle and returns the measured distance.
    ///
    /// Blocks for the 50 ms settle time plus at most [`TIMEOUT_MICROS`]
    /// counted from the start of the call. Both pins must be free for the
    /// whole call and must not be the same line.
    pub fn measure(&mut self, trigger: Pin, echo: Pin) -> Result<Distance, RangeError<G::Error>> {
        debug_assert_ne!(trigger, echo, "trigger and echo must be different pins");

        let start = self.gpio.micros();

        self.gpio.set_mode(trigger, Mode::Output).map_err(RangeError::Gpio)?;
        self.gpio.set_mode(echo, Mode::Input).map_err(RangeError::Gpio)?;
        debug!("trigger on {trigger}, echo on {echo}");

        self.gpio.write(trigger, Level::Low).map_err(RangeError::Gpio)?;
        self.gpio.sleep_millis(SETTLE_MILLIS);

        self.gpio.write(trigger, Level::High).map_err(RangeError::Gpio)?;
        self.gpio.sleep_micros(TRIGGER_PULSE_MICROS);
        self.gpio.write(trigger, Level::Low).map_err(RangeError::Gpio)?;
        trace!("trigger pulse sent");

        let ping_time = self.wait_for(echo, Level::High, start)?;
        debug!("echo rose at {ping_time}us");

        let pong_time = self.wait_for(echo, Level::Low, start)?;
        debug!("echo fell at {pong_time}us");

        Ok(Distance(distance_cm(ping_time, pong_time)))
    }

    /// Busy-polls `pin` until it reads `level` and returns the clock reading
    /// at that moment.
    fn wait_for(&mut self, pin: Pin, level: Level, start: u64) -> Result<u64, RangeError<G::Error>> {
        loop {
            let seen = self.gpio.read(pin).map_err(RangeError::Gpio)?;
            let now = self.gpio.micros();
            if seen == level {
                return Ok(now);
            }
            if now.saturating_sub(start) > TIMEOUT_MICROS {
                warn!("no {level:?} on {pin} within {TIMEOUT_MICROS}us");
                return Err(RangeError::OutOfRange);
            }
        }
    }
}
