use crate::{Clock, GpioPins, Level, Mode, Pin};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::debug;
use std::{collections::HashMap, path::Path, thread::sleep, time::*};

const TRIGGER_CONSUMER: &str = "usonic-trigger";
const ECHO_CONSUMER: &str = "usonic-echo";

#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("cannot open GPIO chip {chip}: {source}")]
    Init {
        chip: String,
        source: gpio_cdev::Error,
    },

    #[error("cannot request {pin}: {source}")]
    Line {
        pin: Pin,
        source: gpio_cdev::Error,
    },

    #[error("{0} has not been configured")]
    NotConfigured(Pin),

    #[error("{pin} is configured as {mode:?}")]
    WrongMode { pin: Pin, mode: Mode },

    #[error("GPIO I/O error: {0}")]
    Io(#[from] gpio_cdev::Error),
}

/// GPIO lines and clock of a Linux GPIO character device.
///
/// Lines are requested lazily by [`GpioPins::set_mode`] and released when the
/// value is dropped.
pub struct CdevGpio {
    chip: Chip,
    lines: HashMap<Pin, (Mode, LineHandle)>,
    epoch: Instant,
}

impl CdevGpio {
    /// Opens the chip, e.g. `/dev/gpiochip0`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GpioError> {
        let path = path.as_ref();
        let chip = Chip::new(path).map_err(|source| GpioError::Init {
            chip: path.display().to_string(),
            source,
        })?;
        debug!("opened {} ({} lines)", chip.name(), chip.num_lines());

        Ok(Self {
            chip,
            lines: HashMap::new(),
            epoch: Instant::now(),
        })
    }

    fn handle(&self, pin: Pin) -> Result<(Mode, &LineHandle), GpioError> {
        self.lines
            .get(&pin)
            .map(|(mode, handle)| (*mode, handle))
            .ok_or(GpioError::NotConfigured(pin))
    }
}

impl GpioPins for CdevGpio {
    type Error = GpioError;

    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<(), GpioError> {
        // The kernel refuses a second request on a line we still hold.
        self.lines.remove(&pin);

        let line = self
            .chip
            .get_line(pin.0)
            .map_err(|source| GpioError::Line { pin, source })?;

        let handle = match mode {
            Mode::Output => line.request(LineRequestFlags::OUTPUT, 0, TRIGGER_CONSUMER),
            Mode::Input => line.request(LineRequestFlags::INPUT, 0, ECHO_CONSUMER),
        }
        .map_err(|source| GpioError::Line { pin, source })?;

        self.lines.insert(pin, (mode, handle));
        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<(), GpioError> {
        match self.handle(pin)? {
            (Mode::Output, handle) => Ok(handle.set_value(level.into())?),
            (mode, _) => Err(GpioError::WrongMode { pin, mode }),
        }
    }

    fn read(&mut self, pin: Pin) -> Result<Level, GpioError> {
        let (_, handle) = self.handle(pin)?;
        Ok(Level::from(handle.get_value()?))
    }
}

impl Clock for CdevGpio {
    fn micros(&mut self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn sleep_millis(&mut self, millis: u64) {
        sleep(Duration::from_millis(millis));
    }

    fn sleep_micros(&mut self, micros: u64) {
        sleep(Duration::from_micros(micros));
    }
}
