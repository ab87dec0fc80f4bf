// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use image::imageops::{self, FilterType};
use tracing::{debug, instrument, trace};

use crate::camera::ValidatedFrame;
use crate::error::RenderFailure;
use crate::image_buffer::ColorImage;

use super::color_map::ColorTable;

/// How much each axis of the sensor frame is enlarged by.
pub const UPSAMPLE_FACTOR: u32 = 10;

/// A false-color thermal image, enlarged and oriented for viewing.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedImage(ColorImage);

impl RenderedImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &ColorImage {
        &self.0
    }

    /// Write the image to `destination`. The format is chosen from the file extension.
    pub fn save(&self, destination: &Path) -> Result<(), RenderFailure> {
        self.0
            .save(destination)
            .map_err(|err| RenderFailure::new(destination.to_path_buf(), err))?;
        debug!(destination = %destination.display(), "Saved thermal image");
        Ok(())
    }
}

/// Turns validated frames into false-color images using a fixed color table.
#[derive(Clone, Debug, Default)]
pub struct ImageRenderer {
    table: ColorTable,
}

impl ImageRenderer {
    pub fn new(table: ColorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    /// Map each reading to a color, keeping the frame's size and row-major layout.
    pub fn color_frame(&self, frame: &ValidatedFrame) -> ColorImage {
        let source = frame.image();
        let mut colors = ColorImage::new(source.width(), source.height());
        for (reading, pixel) in frame.readings().iter().zip(colors.pixels_mut()) {
            *pixel = self.table.lookup(*reading).into();
        }
        colors
    }

    /// Color, enlarge, then reorient a frame.
    ///
    /// The sensor is mounted rotated relative to the hob, so the enlarged image is rotated 90°
    /// counter-clockwise and then mirrored horizontally. Sensor rows become columns running right
    /// to left, and sensor columns become rows running bottom to top.
    #[instrument(level = "debug", skip(self, frame))]
    pub fn render(&self, frame: &ValidatedFrame) -> RenderedImage {
        let colors = self.color_frame(frame);
        let enlarged_width = colors.width() * UPSAMPLE_FACTOR;
        let enlarged_height = colors.height() * UPSAMPLE_FACTOR;
        let enlarged = imageops::resize(
            &colors,
            enlarged_width,
            enlarged_height,
            FilterType::CatmullRom,
        );
        trace!(
            source_width = colors.width(),
            source_height = colors.height(),
            enlarged_width,
            enlarged_height,
            "enlarged source image"
        );
        let rotated = imageops::rotate270(&enlarged);
        RenderedImage(imageops::flip_horizontal(&rotated))
    }

    /// Render `frame` and write the result to `destination`.
    pub fn render_to(
        &self,
        frame: &ValidatedFrame,
        destination: &Path,
    ) -> Result<RenderedImage, RenderFailure> {
        let rendered = self.render(frame);
        rendered.save(destination)?;
        Ok(rendered)
    }
}
