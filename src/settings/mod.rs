// SPDX-License-Identifier: GPL-3.0-or-later
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

mod cli;

use crate::camera::SensorSettings;
pub use cli::Args;

fn default_destination() -> PathBuf {
    PathBuf::from("thermal.png")
}

fn default_interval_ms() -> u64 {
    1000
}

/// How often, and where, frames are captured.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CaptureSettings {
    /// Where each rendered image is written. The file is replaced on every capture.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Delay between the end of one capture and the start of the next, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Stop after this many captures. Runs forever if unset.
    #[serde(default)]
    pub count: Option<u64>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            interval_ms: default_interval_ms(),
            count: None,
        }
    }
}

impl CaptureSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// The thermal sensor to read from.
    pub sensor: SensorSettings,

    #[serde(default)]
    pub capture: CaptureSettings,
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let config_data = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        toml::from_str(&config_data)
            .with_context(|| format!("Unable to parse config file {}", path.display()))
    }

    /// Apply any overrides given on the command line.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(destination) = &args.destination {
            self.capture.destination = destination.clone();
        }
        if args.count.is_some() {
            self.capture.count = args.count;
        }
    }
}
