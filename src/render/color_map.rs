// SPDX-License-Identifier: GPL-3.0-or-later
use std::ops::Index;

use tracing::trace;

use super::color::Color;

/// Number of entries in a [`ColorTable`].
pub const COLOR_DEPTH: usize = 1000;

/// Temperatures at or below this map to the first (black) end of the table.
pub const MIN_TEMP: f32 = 20.0;

/// Temperatures at or above this map to the last (white) end of the table.
pub const MAX_TEMP: f32 = 200.0;

/// How far each control point's influence spreads. Larger values make sharper transitions.
const SPREAD: f64 = 1.0;

/// One anchor of a palette: a position along the ramp (0.0 to 1.0) and the unit RGB color there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoint {
    pub position: f64,
    pub color: [f64; 3],
}

impl ControlPoint {
    pub const fn new(position: f64, color: [f64; 3]) -> Self {
        Self { position, color }
    }
}

/// Black, navy, green, red, gold, amber, then white.
pub const THERMAL_PALETTE: [ControlPoint; 7] = [
    ControlPoint::new(0.0, [0.0, 0.0, 0.0]),
    ControlPoint::new(0.20, [0.0, 0.0, 0.5]),
    ControlPoint::new(0.40, [0.0, 0.5, 0.0]),
    ControlPoint::new(0.60, [0.5, 0.0, 0.0]),
    ControlPoint::new(0.80, [0.75, 0.75, 0.0]),
    ControlPoint::new(0.90, [1.0, 0.75, 0.0]),
    ControlPoint::new(1.00, [1.0, 1.0, 1.0]),
];

/// An ordered set of control points, blended together with Gaussian kernels.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    points: Vec<ControlPoint>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(THERMAL_PALETTE.to_vec())
    }
}

impl Palette {
    pub fn new(points: Vec<ControlPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// The color at `x`, where the full ramp spans `0..width`.
    ///
    /// Each channel is the sum of one Gaussian per control point, centered on the control point
    /// position and scaled by that point's channel value.
    fn gradient(&self, x: f64, width: f64) -> Color {
        let sigma = width / (SPREAD * self.points.len() as f64);
        let channel = |channel: usize| -> f64 {
            self.points
                .iter()
                .map(|point| gaussian(x, point.color[channel], point.position * width, sigma))
                .sum()
        };
        Color::from_unit(channel(0), channel(1), channel(2))
    }
}

fn gaussian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    amplitude * (-(x - center).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// A precomputed lookup table of [`COLOR_DEPTH`] colors for a palette.
///
/// Tables never change once built, so they can be shared freely.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    colors: Vec<Color>,
}

/// Build the color table for `palette`.
pub fn build_table(palette: &Palette) -> ColorTable {
    let width = COLOR_DEPTH as f64;
    let colors: Vec<Color> = (0..COLOR_DEPTH)
        .map(|index| palette.gradient(index as f64, width))
        .collect();
    trace!(entries = colors.len(), "built color table");
    ColorTable { colors }
}

impl Default for ColorTable {
    fn default() -> Self {
        build_table(&Palette::default())
    }
}

impl ColorTable {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// The table index for a temperature.
    ///
    /// [`MIN_TEMP`]..[`MAX_TEMP`] is mapped linearly onto the table. Temperatures outside that
    /// range saturate to either end.
    pub fn index_for(temperature: f32) -> usize {
        let last = (COLOR_DEPTH - 1) as f32;
        let scaled = (temperature - MIN_TEMP) * last / (MAX_TEMP - MIN_TEMP);
        scaled.max(0.0).min(last) as usize
    }

    /// The color for a temperature.
    pub fn lookup(&self, temperature: f32) -> Color {
        self.colors[Self::index_for(temperature)]
    }
}

impl Index<usize> for ColorTable {
    type Output = Color;

    fn index(&self, index: usize) -> &Self::Output {
        &self.colors[index]
    }
}
