//! In-memory board for exercising [`RangeSensor`](crate::RangeSensor) without
//! hardware.
//!
//! The virtual clock only moves when it is read or when the code sleeps, so
//! every poll iteration costs exactly one `step`. The echo line follows a
//! script relative to the end of the last trigger pulse.

use crate::{Clock, GpioPins, Level, Mode, Pin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("simulated read failure")]
pub struct SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    SetMode(Pin, Mode),
    Write(Pin, Level),
    Read(Pin),
    SleepMillis(u64),
    SleepMicros(u64),
}

pub struct SimBoard {
    now: u64,
    origin: u64,
    step: u64,
    /// Delay from the trigger falling edge to the echo rising edge.
    rise_after: Option<u64>,
    /// Echo pulse width, `None` keeps the line high forever.
    width: Option<u64>,
    trigger_high: bool,
    pulse_end: Option<u64>,
    fail_reads: bool,
    calls: Vec<Call>,
    reads: Vec<Level>,
}

impl SimBoard {
    pub fn with_echo(rise_after: u64, width: Option<u64>) -> Self {
        Self {
            now: 0,
            origin: 0,
            step: 1,
            rise_after: Some(rise_after),
            width,
            trigger_high: false,
            pulse_end: None,
            fail_reads: false,
            calls: Vec::new(),
            reads: Vec::new(),
        }
    }

    pub fn with_echo_never() -> Self {
        Self { rise_after: None, ..Self::with_echo(0, None) }
    }

    pub fn starting_at(mut self, now: u64) -> Self {
        self.now = now;
        self.origin = now;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Virtual time spent since the board was created.
    pub fn elapsed(&self) -> u64 {
        self.now - self.origin
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn reads(&self) -> &[Level] {
        &self.reads
    }

    fn echo_level(&self) -> Level {
        let (Some(end), Some(rise_after)) = (self.pulse_end, self.rise_after) else {
            return Level::Low;
        };
        let rise = end + rise_after;
        let falling = self.width.map(|w| rise + w);
        match falling {
            _ if self.now < rise => Level::Low,
            Some(fall) if self.now >= fall => Level::Low,
            _ => Level::High,
        }
    }
}

impl GpioPins for SimBoard {
    type Error = SimError;

    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<(), SimError> {
        self.calls.push(Call::SetMode(pin, mode));
        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<(), SimError> {
        self.calls.push(Call::Write(pin, level));
        match level {
            Level::High => self.trigger_high = true,
            Level::Low if self.trigger_high => {
                self.trigger_high = false;
                self.pulse_end = Some(self.now);
            }
            Level::Low => {}
        }
        Ok(())
    }

    fn read(&mut self, pin: Pin) -> Result<Level, SimError> {
        self.calls.push(Call::Read(pin));
        if self.fail_reads {
            return Err(SimError);
        }
        let level = self.echo_level();
        self.reads.push(level);
        Ok(level)
    }
}

impl Clock for SimBoard {
    fn micros(&mut self) -> u64 {
        self.now += self.step;
        self.now
    }

    fn sleep_millis(&mut self, millis: u64) {
        self.calls.push(Call::SleepMillis(millis));
        self.now += millis * 1000;
    }

    fn sleep_micros(&mut self, micros: u64) {
        self.calls.push(Call::SleepMicros(micros));
        self.now += micros;
    }
}
