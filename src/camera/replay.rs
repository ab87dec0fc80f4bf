// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context as _};
use serde::de::{Deserialize, IntoDeserializer};
use tracing::trace;

use crate::error::SensorFault;
use crate::image_buffer::{self, RawFrame};

use super::sensor::SensorPort;

/// The kinds of fault that can be injected into a recording.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Io,
    Decode,
    Busy,
}

/// One entry in a recording: either the readings of a frame, or a fault the sensor raised.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum RecordedFrame {
    Frame { values: Vec<f32> },
    Fault { fault: FaultKind },
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Recording {
    #[serde(default)]
    pub frames: Vec<RecordedFrame>,
}

impl FromStr for Recording {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

/// Controls how frames are repeated by [`ReplaySensor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Don't repeat.
    ///
    /// Once the end of the recording has been reached, every poll is an I/O fault.
    None,

    /// Loop over the recording. This is the default mode.
    Loop,

    /// Alternate between forward and reverse playback.
    ///
    /// The frames at either end of the recording are *not* repeated.
    Bounce,
}

impl Default for RepeatMode {
    fn default() -> Self {
        Self::Loop
    }
}

impl FromStr for RepeatMode {
    type Err = serde::de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepeatMode::deserialize(s.into_deserializer())
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatMode::None => "none",
            RepeatMode::Loop => "loop",
            RepeatMode::Bounce => "bounce",
        };
        write!(f, "{}", s)
    }
}

/// A sensor that plays back previously recorded frames (and faults).
///
/// Useful for development without a camera attached, and for exercising the retry logic with
/// known-bad frames.
pub struct ReplaySensor {
    frames: Vec<RecordedFrame>,
    index: Box<dyn Iterator<Item = usize> + Send + Sync>,
}

impl ReplaySensor {
    pub fn new(recording: Recording, repeat: RepeatMode) -> Self {
        let num_frames = recording.frames.len();
        let index: Box<dyn Iterator<Item = usize> + Send + Sync> = match repeat {
            RepeatMode::None => Box::new(0..num_frames),
            RepeatMode::Loop => Box::new((0..num_frames).cycle()),
            RepeatMode::Bounce => {
                let forwards = 0..num_frames;
                let backwards = (1..num_frames.saturating_sub(1)).rev();
                Box::new(forwards.chain(backwards).cycle())
            }
        };
        Self {
            frames: recording.frames,
            index,
        }
    }

    /// Load a TOML recording from a file.
    pub fn open<P: AsRef<Path>>(path: P, repeat: RepeatMode) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read recording {}", path.display()))?;
        let recording: Recording = data
            .parse()
            .with_context(|| format!("Unable to parse recording {}", path.display()))?;
        Ok(Self::new(recording, repeat))
    }
}

impl fmt::Debug for ReplaySensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaySensor")
            .field("frames", &self.frames.len())
            .finish()
    }
}

impl SensorPort for ReplaySensor {
    fn poll(&mut self) -> Result<RawFrame, SensorFault> {
        let index = self
            .index
            .next()
            .ok_or_else(|| SensorFault::Io(anyhow!("No more frames in recording")))?;
        trace!(index, "replaying recorded frame");
        match &self.frames[index] {
            RecordedFrame::Frame { values } => image_buffer::frame_from_readings(values.clone())
                .ok_or_else(|| {
                    SensorFault::Decode(format!(
                        "recorded frame {} has {} readings, expected {}",
                        index,
                        values.len(),
                        image_buffer::FRAME_LEN
                    ))
                }),
            RecordedFrame::Fault { fault } => Err(match fault {
                FaultKind::Io => SensorFault::Io(anyhow!("Recorded I/O fault")),
                FaultKind::Decode => SensorFault::Decode("recorded decode fault".to_string()),
                FaultKind::Busy => SensorFault::Busy,
            }),
        }
    }
}
