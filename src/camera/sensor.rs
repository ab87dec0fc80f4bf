// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;
use std::error::Error as StdError;

use anyhow::Context as _;
use embedded_hal::blocking::i2c;
use tracing::trace;

use crate::error::SensorFault;
use crate::image_buffer::{self, RawFrame};

/// A source of raw thermal frames.
///
/// Implementations talk to the device directly and never retry; a failed poll is reported as a
/// [`SensorFault`] and the caller decides what to do about it. Sensors are not reentrant, so
/// `poll` takes `&mut self`.
pub trait SensorPort {
    /// Read one full frame from the sensor.
    fn poll(&mut self) -> Result<RawFrame, SensorFault>;
}

impl<S: SensorPort + ?Sized> SensorPort for Box<S> {
    fn poll(&mut self) -> Result<RawFrame, SensorFault> {
        (**self).poll()
    }
}

/// A Melexis MLX90640 (32x24) connected over I2C.
#[derive(Debug)]
pub struct Mlx90640<I2C> {
    camera: mlx9064x::Mlx90640Driver<I2C>,
    temperature_buffer: Vec<f32>,
}

impl<I2C> Mlx90640<I2C>
where
    I2C: 'static + i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: 'static + StdError + Sync + Send,
    <I2C as i2c::Write>::Error: 'static + StdError + Sync + Send,
{
    pub fn new(camera: mlx9064x::Mlx90640Driver<I2C>) -> Self {
        let num_pixels = camera.height() * camera.width();
        Self {
            camera,
            temperature_buffer: vec![0f32; num_pixels],
        }
    }

    pub fn set_frame_rate(&mut self, frame_rate: u8) -> anyhow::Result<()> {
        let mlx_frame_rate =
            mlx9064x::FrameRate::try_from(frame_rate).context("Invalid frame rate")?;
        self.camera
            .set_frame_rate(mlx_frame_rate)
            .context("Error setting camera frame rate")
    }
}

impl<I2C> SensorPort for Mlx90640<I2C>
where
    I2C: 'static + i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: 'static + StdError + Sync + Send,
    <I2C as i2c::Write>::Error: 'static + StdError + Sync + Send,
{
    fn poll(&mut self) -> Result<RawFrame, SensorFault> {
        // Both subpages have to be read before the image is complete; the driver blocks until
        // that's done.
        self.camera
            .generate_image_to(&mut self.temperature_buffer)
            .map_err(|err| SensorFault::Io(anyhow::Error::new(err)))?;
        trace!("read frame from MLX90640");
        // mlx9064x uses row-major ordering, so no swapping needed here.
        image_buffer::frame_from_readings(self.temperature_buffer.clone()).ok_or_else(|| {
            SensorFault::Decode(format!(
                "expected {} readings, camera provided {}",
                image_buffer::FRAME_LEN,
                self.temperature_buffer.len()
            ))
        })
    }
}
