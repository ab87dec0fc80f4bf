// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;
use std::path::PathBuf;

use anyhow::Context as _;
use linux_embedded_hal::I2cdev;
use tracing::info;

use super::i2c::Bus;
use super::replay::{RepeatMode, ReplaySensor};
use super::sensor::{Mlx90640, SensorPort};

fn default_mlx90640_address() -> u8 {
    0x33
}

fn default_mlx90640_frame_rate() -> u8 {
    32
}

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SensorSettings {
    Mlx90640 {
        bus: Bus,

        #[serde(default = "default_mlx90640_address")]
        address: u8,

        #[serde(default = "default_mlx90640_frame_rate")]
        frame_rate: u8,
    },
    Replay {
        path: PathBuf,

        #[serde(default)]
        repeat_mode: RepeatMode,
    },
}

impl SensorSettings {
    /// Open the configured sensor.
    pub fn create_sensor(&self) -> anyhow::Result<Box<dyn SensorPort + Send>> {
        Ok(match self {
            Self::Mlx90640 {
                bus,
                address,
                frame_rate,
            } => {
                info!(?bus, address, frame_rate, "Initialising MLX90640");
                let bus = I2cdev::try_from(bus).context("Unable to connect to I2C bus")?;
                let driver = mlx9064x::Mlx90640Driver::new(bus, *address)
                    .context("Unable to initialise MLX90640")?;
                let mut camera = Mlx90640::new(driver);
                camera.set_frame_rate(*frame_rate)?;
                Box::new(camera)
            }
            Self::Replay { path, repeat_mode } => {
                info!(path = %path.display(), %repeat_mode, "Replaying recorded frames");
                Box::new(ReplaySensor::open(path, *repeat_mode)?)
            }
        })
    }
}
