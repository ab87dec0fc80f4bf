// SPDX-License-Identifier: GPL-3.0-or-later
//! Thermal camera acquisition for a cooking hob.
//!
//! A single worker thread polls the sensor until it gets a plausible frame, estimates the
//! temperature of the center of the hob, and renders a false-color image of the whole frame.
pub mod acquisition;
pub mod camera;
pub mod error;
pub mod image_buffer;
pub mod render;
pub mod settings;
pub mod temperature;
mod util;

pub use acquisition::{AcquisitionWorker, Snapshot, WorkerState};
pub use camera::{FrameValidator, SensorPort, ValidatedFrame};
pub use error::{AcquisitionError, Rejection, RenderFailure, SensorFault};
pub use render::{ColorTable, ImageRenderer};
pub use temperature::{TemperatureEstimator, TemperatureSample, ThermalHistory};
