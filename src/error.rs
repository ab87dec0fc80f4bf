// SPDX-License-Identifier: GPL-3.0-or-later
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Transient failures reading a frame from a sensor.
///
/// None of these are surfaced past the frame validator; they are logged and the sensor is polled
/// again after a short delay.
pub enum SensorFault {
    /// Communication with the device failed.
    Io(anyhow::Error),

    /// The device responded, but the data could not be turned into a frame.
    Decode(String),

    /// The device is not ready to provide a frame yet.
    Busy,
}

impl fmt::Debug for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => f.debug_tuple("Io").field(e).finish(),
            Self::Decode(msg) => f.debug_tuple("Decode").field(msg).finish(),
            Self::Busy => f.debug_tuple("Busy").finish(),
        }
    }
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "sensor I/O error: {}", e),
            Self::Decode(msg) => write!(f, "unable to decode sensor frame: {}", msg),
            Self::Busy => f.write_str("sensor busy"),
        }
    }
}

impl StdError for SensorFault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            Self::Decode(_) => None,
            Self::Busy => None,
        }
    }
}

/// The reasons a frame is considered physically implausible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rejection {
    /// A reading of exactly zero, the signature of the chessboard artifact.
    ZeroReading { index: usize },

    /// The hottest reading is above the upper plausibility threshold.
    AboveMaximum(f32),

    /// The coldest reading is below the lower plausibility threshold.
    BelowMinimum(f32),

    /// A reading that is NaN or infinite.
    NotFinite { index: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroReading { index } => write!(f, "Zero Error at element {}", index),
            Self::AboveMaximum(max) => write!(f, "Max Temp Error: {:0.2}", max),
            Self::BelowMinimum(min) => write!(f, "Min Temp Error: {:0.2}", min),
            Self::NotFinite { index } => write!(f, "Non-finite reading at element {}", index),
        }
    }
}

impl StdError for Rejection {}

/// A rendered image could not be written to its destination.
#[derive(Debug)]
pub struct RenderFailure {
    destination: PathBuf,
    source: image::ImageError,
}

impl RenderFailure {
    pub(crate) fn new(destination: PathBuf, source: image::ImageError) -> Self {
        Self {
            destination,
            source,
        }
    }

    /// Where the image was supposed to be written.
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unable to write thermal image to {}: {}",
            self.destination.display(),
            self.source
        )
    }
}

impl StdError for RenderFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// Errors visible to users of [`AcquisitionWorker`][crate::acquisition::AcquisitionWorker].
pub enum AcquisitionError {
    /// One or more requests finished, but their images could not be written.
    Render(Vec<RenderFailure>),

    /// The worker has been shut down (or exited) and is no longer accepting requests.
    Stopped,

    /// The worker thread panicked.
    WorkerPanicked,

    /// The worker thread could not be started.
    Spawn(io::Error),
}

impl fmt::Debug for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Render(failures) => f.debug_tuple("Render").field(failures).finish(),
            Self::Stopped => f.debug_tuple("Stopped").finish(),
            Self::WorkerPanicked => f.debug_tuple("WorkerPanicked").finish(),
            Self::Spawn(e) => f.debug_tuple("Spawn").field(e).finish(),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Render(failures) => match failures.as_slice() {
                [single] => fmt::Display::fmt(single, f),
                _ => write!(f, "{} thermal images could not be written", failures.len()),
            },
            Self::Stopped => f.write_str("Acquisition worker has stopped"),
            Self::WorkerPanicked => f.write_str("Acquisition worker panicked"),
            Self::Spawn(e) => write!(f, "Unable to start acquisition worker: {}", e),
        }
    }
}

impl StdError for AcquisitionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Render(failures) => failures.first().map(|e| e as &(dyn StdError + 'static)),
            Self::Stopped => None,
            Self::WorkerPanicked => None,
            Self::Spawn(e) => Some(e),
        }
    }
}

impl From<Vec<RenderFailure>> for AcquisitionError {
    fn from(failures: Vec<RenderFailure>) -> Self {
        Self::Render(failures)
    }
}

impl From<io::Error> for AcquisitionError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}
