// SPDX-License-Identifier: GPL-3.0-or-later
use structopt::StructOpt;

use std::path::PathBuf;

#[derive(Debug, StructOpt)]
#[structopt()]
pub struct Args {
    /// Path to a configuration file.
    #[structopt(short, long, parse(from_os_str), default_value = "config.toml")]
    pub config_path: PathBuf,

    /// Write rendered images here instead of the configured destination.
    #[structopt(short, long, parse(from_os_str))]
    pub destination: Option<PathBuf>,

    /// Stop after this many captures.
    #[structopt(short = "n", long)]
    pub count: Option<u64>,
}
