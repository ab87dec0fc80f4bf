// SPDX-License-Identifier: GPL-3.0-or-later
pub mod color;
mod color_map;
mod renderer;

pub use color::Color;
pub use color_map::{
    build_table, ColorTable, ControlPoint, Palette, COLOR_DEPTH, MAX_TEMP, MIN_TEMP,
    THERMAL_PALETTE,
};
pub use renderer::{ImageRenderer, RenderedImage, UPSAMPLE_FACTOR};
