use clap::Parser;
use log::error;
use std::{io, path::PathBuf, process::ExitCode};
use usonic::{CdevGpio, Pin, RangeSensor, report};

/// Take one HC-SR04 reading and print the distance.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// GPIO line driving the sensor's TRIG input.
    trigger: Pin,

    /// GPIO line reading the sensor's ECHO output.
    echo: Pin,

    /// GPIO character device the lines belong to.
    #[arg(long, default_value = "/dev/gpiochip0")]
    chip: PathBuf,
}

impl Args {
    fn validate(self) -> Result<Self, clap::Error> {
        if self.trigger == self.echo {
            return Err(clap::Error::raw(
                clap::error::ErrorKind::ArgumentConflict,
                format!("trigger and echo must be different pins (both are {})\n", self.trigger),
            ));
        }
        Ok(self)
    }
}

/// Gives up root, which opening the chip may have needed.
fn drop_privileges() -> io::Result<()> {
    // SAFETY: getuid cannot fail and setuid only reads its argument.
    let rc = unsafe { libc::setuid(libc::getuid()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let gpio = CdevGpio::open(&args.chip)?;

    drop_privileges().map_err(|e| format!("dropping privileges failed: {e}"))?;

    let mut sensor = RangeSensor::new(gpio);
    report(&mut sensor, args.trigger, args.echo, &mut io::stdout().lock())?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse().and_then(Args::validate) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
