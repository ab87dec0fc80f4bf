// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::error::{Rejection, SensorFault};
use crate::image_buffer::{RawFrame, ThermalImage};

use super::sensor::SensorPort;

/// Frames with any reading above this are chessboard garbage, not a very hot pan.
pub const MAX_THRESHOLD: f32 = 300.0;

/// Frames with any reading below this are chessboard garbage.
pub const MIN_THRESHOLD: f32 = 5.0;

/// How long to wait before polling the sensor again after a fault or a rejected frame.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// A frame that has passed every plausibility check.
///
/// The only way to get one is through [`TryFrom<RawFrame>`] (or [`FrameValidator::acquire`]),
/// so holding one means there are no zero readings and every reading is within
/// [`MIN_THRESHOLD`]..=[`MAX_THRESHOLD`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedFrame(ThermalImage);

impl ValidatedFrame {
    /// The readings in row-major order.
    pub fn readings(&self) -> &[f32] {
        self.0.as_raw()
    }

    pub fn image(&self) -> &ThermalImage {
        &self.0
    }
}

impl TryFrom<RawFrame> for ValidatedFrame {
    type Error = Rejection;

    fn try_from(frame: RawFrame) -> Result<Self, Self::Error> {
        let readings = frame.as_raw();
        if let Some(index) = readings.iter().position(|r| *r == 0.0) {
            return Err(Rejection::ZeroReading { index });
        }
        let max = readings.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max > MAX_THRESHOLD {
            return Err(Rejection::AboveMaximum(max));
        }
        let min = readings.iter().copied().fold(f32::INFINITY, f32::min);
        if min < MIN_THRESHOLD {
            return Err(Rejection::BelowMinimum(min));
        }
        // NaN slips through the comparisons above.
        if let Some(index) = readings.iter().position(|r| !r.is_finite()) {
            return Err(Rejection::NotFinite { index });
        }
        Ok(Self(frame))
    }
}

/// Pulls frames from a sensor until one is plausible.
#[derive(Clone, Copy, Debug)]
pub struct FrameValidator {
    backoff: Duration,
}

impl Default for FrameValidator {
    fn default() -> Self {
        Self::new(RETRY_BACKOFF)
    }
}

impl FrameValidator {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Poll `sensor` until it produces a frame that passes validation.
    ///
    /// Faults and implausible frames are logged, followed by a pause of the backoff interval
    /// before the next poll. There is no limit on the number of attempts; the sensor is expected
    /// to recover on its own within a few frames.
    #[instrument(level = "debug", skip(self, sensor))]
    pub fn acquire<S>(&self, sensor: &mut S) -> ValidatedFrame
    where
        S: SensorPort + ?Sized,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match sensor.poll() {
                Ok(frame) => match ValidatedFrame::try_from(frame) {
                    Ok(validated) => {
                        debug!(
                            attempts,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Captured frame"
                        );
                        return validated;
                    }
                    Err(rejection) => debug!(%rejection, "Frame capture error, retrying"),
                },
                Err(SensorFault::Io(error)) => {
                    info!(%error, "Frame capture error, retrying");
                }
                Err(fault) => debug!(%fault, "Frame capture error, retrying"),
            }
            thread::sleep(self.backoff);
        }
    }
}
