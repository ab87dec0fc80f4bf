// SPDX-License-Identifier: GPL-3.0-or-later
use std::thread;

use anyhow::Context as _;
use structopt::StructOpt;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use hob_thermal::settings::{Args, Settings};
use hob_thermal::AcquisitionWorker;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::from_args();
    let mut settings = Settings::from_path(&args.config_path)?;
    settings.apply_args(&args);
    let capture = settings.capture;

    let sensor = settings.sensor.create_sensor()?;
    let worker = AcquisitionWorker::start(sensor).context("Unable to start thermal camera")?;

    let mut captured: u64 = 0;
    while capture.count.map_or(true, |count| captured < count) {
        worker
            .submit(&capture.destination)
            .context("Thermal camera stopped unexpectedly")?;
        match worker.await_completion() {
            Ok(snapshot) => {
                info!(temperature = %snapshot.temperature, "Captured thermal image");
                match serde_json::to_string(&snapshot) {
                    Ok(json) => debug!(%json, "Current state"),
                    Err(err) => warn!(%err, "Unable to serialize current state"),
                }
            }
            Err(err) => warn!(%err, "Capture failed"),
        }
        captured += 1;
        thread::sleep(capture.interval());
    }

    worker.shutdown().context("Error stopping thermal camera")?;
    Ok(())
}
