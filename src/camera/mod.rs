// SPDX-License-Identifier: GPL-3.0-or-later
mod i2c;
mod replay;
#[cfg(test)]
pub(crate) mod scripted;
mod sensor;
mod settings;
mod validator;

pub use i2c::Bus;
pub use replay::{FaultKind, RecordedFrame, Recording, RepeatMode, ReplaySensor};
pub use sensor::{Mlx90640, SensorPort};
pub use settings::SensorSettings;
pub use validator::{FrameValidator, ValidatedFrame, MAX_THRESHOLD, MIN_THRESHOLD, RETRY_BACKOFF};
