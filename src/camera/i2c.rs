// SPDX-License-Identifier: GPL-3.0-or-later
use linux_embedded_hal::I2cdev;

use i2cdev::linux::LinuxI2CError;
use serde::Deserialize;

use std::convert::{Infallible, TryFrom};
use std::path::PathBuf;
use std::str::FromStr;

use crate::util::parse_int_decimal_hex;

/// The I2C bus a sensor is attached to, either by number (`/dev/i2c-N`) or by device path.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Bus {
    Number(u32),
    Path(PathBuf),
}

impl From<u32> for Bus {
    fn from(bus: u32) -> Self {
        Self::Number(bus)
    }
}

impl FromStr for Bus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_int_decimal_hex(s) {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Path(PathBuf::from(s)),
        })
    }
}

impl Bus {
    /// The path to the device node for this bus.
    pub fn device_path(&self) -> PathBuf {
        match self {
            Bus::Number(n) => PathBuf::from(format!("/dev/i2c-{}", n)),
            Bus::Path(p) => p.clone(),
        }
    }
}

impl TryFrom<&Bus> for I2cdev {
    type Error = LinuxI2CError;

    fn try_from(bus: &Bus) -> Result<Self, Self::Error> {
        I2cdev::new(bus.device_path())
    }
}
