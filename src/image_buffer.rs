// SPDX-License-Identifier: GPL-3.0-or-later
use image::{ImageBuffer, Luma, Rgb};

/// Width of a sensor frame, in elements.
pub const FRAME_WIDTH: u32 = 32;

/// Height of a sensor frame, in elements.
pub const FRAME_HEIGHT: u32 = 24;

/// Number of readings in one frame.
pub const FRAME_LEN: usize = (FRAME_WIDTH * FRAME_HEIGHT) as usize;

/// Images where each point is a temperature in degrees Celsius, stored row-major.
pub type ThermalImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// A frame exactly as the sensor reported it. Nothing about it has been checked yet.
pub type RawFrame = ThermalImage;

/// Rendered false-color images.
pub type ColorImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Build a [`RawFrame`] from row-major readings.
///
/// Returns `None` if `readings` does not hold exactly one frame's worth of values.
pub fn frame_from_readings(readings: Vec<f32>) -> Option<RawFrame> {
    if readings.len() != FRAME_LEN {
        return None;
    }
    ThermalImage::from_raw(FRAME_WIDTH, FRAME_HEIGHT, readings)
}
