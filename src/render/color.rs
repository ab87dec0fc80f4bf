// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::From;

/// An 8-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
}

impl From<Color> for image::Rgb<u8> {
    fn from(color: Color) -> Self {
        image::Rgb(color.as_array())
    }
}

impl From<&image::Rgb<u8>> for Color {
    fn from(pixel: &image::Rgb<u8>) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2])
    }
}

impl Color {
    pub const BLACK: Self = Self {
        red: u8::MIN,
        green: u8::MIN,
        blue: u8::MIN,
    };

    pub const WHITE: Self = Self {
        red: u8::MAX,
        green: u8::MAX,
        blue: u8::MAX,
    };

    /// Create a new [Color] with the given 8-bit color values.
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a [Color] from unit (0.0 to 1.0) channel intensities.
    ///
    /// Each channel is scaled to 0-255, clamped, and truncated.
    pub fn from_unit(red: f64, green: f64, blue: f64) -> Self {
        fn channel(unit: f64) -> u8 {
            (unit * u8::MAX as f64).max(0.0).min(u8::MAX as f64) as u8
        }
        Self::new(channel(red), channel(green), channel(blue))
    }

    /// The 8-bit color value of the red component.
    pub fn red(&self) -> u8 {
        self.red
    }

    /// The 8-bit color value of the green component.
    pub fn green(&self) -> u8 {
        self.green
    }

    /// The 8-bit color value of the blue component.
    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// The red, green, and blue components as a 3 element array.
    pub fn as_array(&self) -> [u8; 3] {
        [self.red(), self.green(), self.blue()]
    }
}
