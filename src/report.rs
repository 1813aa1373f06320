use crate::{Clock, GpioPins, Pin, RangeError, RangeSensor};
use std::{error::Error, io::{self, Write}};

#[derive(Debug, thiserror::Error)]
pub enum ReportError<E: Error + 'static> {
    #[error(transparent)]
    Measure(#[from] RangeError<E>),

    #[error("cannot write measurement: {0}")]
    Output(#[from] io::Error),
}

/// Takes one reading and writes its line to `out`.
///
/// A timeout is a reading: it prints `Out of range` and returns `Ok`. Backend
/// failures print nothing and come back as errors.
pub fn report<G, W>(
    sensor: &mut RangeSensor<G>,
    trigger: Pin,
    echo: Pin,
    out: &mut W,
) -> Result<(), ReportError<G::Error>>
where
    G: GpioPins + Clock,
    W: Write,
{
    match sensor.measure(trigger, echo) {
        Ok(distance) => writeln!(out, "Distance: {distance}")?,
        Err(err @ RangeError::OutOfRange) => writeln!(out, "{err}")?,
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
