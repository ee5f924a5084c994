use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::morphology::ensure_nonempty,
    error::{DropletError, Result},
    traits::ImagePreprocessor,
};

/// Counter-clockwise rotation with canvas expansion followed by a crop to `[x1, x2) × [y1, y2)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RotateCropPreprocessor {
    /// Rotation angle in degrees, counter-clockwise
    #[serde(default)]
    pub theta_degrees: f32,
    pub x1: u32,
    pub x2: u32,
    pub y1: u32,
    pub y2: u32,
}

impl RotateCropPreprocessor {
    fn rotate(&self, image: &RgbImage) -> RgbImage {
        if self.theta_degrees.rem_euclid(360.0) == 0.0 {
            return image.clone();
        }
        let theta = self.theta_degrees.to_radians();
        let (w, h) = (image.width() as f32, image.height() as f32);
        let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
        let out_w = (w * cos + h * sin).round().max(1.0) as u32;
        let out_h = (w * sin + h * cos).round().max(1.0) as u32;

        // Image y points down, so a visual counter-clockwise turn is a negative angle.
        let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
            * Projection::rotate(-theta)
            * Projection::translate(-w / 2.0, -h / 2.0);

        let mut out = RgbImage::new(out_w, out_h);
        warp_into(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);
        out
    }
}

impl ImagePreprocessor for RotateCropPreprocessor {
    fn preprocess(&self, image: &RgbImage) -> Result<RgbImage> {
        ensure_nonempty(image.dimensions(), "rotate/crop input")?;
        let rotated = self.rotate(image);
        if self.x1 >= self.x2 || self.y1 >= self.y2 || self.x2 > rotated.width() || self.y2 > rotated.height() {
            return Err(DropletError::InvalidInput(format!(
                "crop [{}, {}) x [{}, {}) does not fit a {}x{} raster",
                self.x1,
                self.x2,
                self.y1,
                self.y2,
                rotated.width(),
                rotated.height()
            )));
        }
        Ok(image::imageops::crop_imm(&rotated, self.x1, self.y1, self.x2 - self.x1, self.y2 - self.y1).to_image())
    }
}

/// Photometric inversion as a pipeline step
#[derive(Debug, Clone, Default)]
pub struct InvertPreprocessor;

impl ImagePreprocessor for InvertPreprocessor {
    fn preprocess(&self, image: &RgbImage) -> Result<RgbImage> {
        ensure_nonempty(image.dimensions(), "invert input")?;
        Ok(crate::algorithms::morphology::invert_rgb(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(40, 20, |x, y| Rgb([x as u8 * 5, y as u8 * 10, 0]))
    }

    #[test]
    fn test_crop_without_rotation() {
        let step = RotateCropPreprocessor { theta_degrees: 0.0, x1: 10, x2: 20, y1: 5, y2: 15 };
        let out = step.preprocess(&gradient()).unwrap();
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 50, 0]));
    }

    #[test]
    fn test_quarter_turn_swaps_canvas() {
        let step = RotateCropPreprocessor { theta_degrees: 90.0, x1: 0, x2: 20, y1: 0, y2: 40 };
        let out = step.preprocess(&gradient()).unwrap();
        assert_eq!(out.dimensions(), (20, 40));
    }

    #[test]
    fn test_crop_out_of_bounds_rejected() {
        let step = RotateCropPreprocessor { theta_degrees: 0.0, x1: 0, x2: 41, y1: 0, y2: 10 };
        assert!(matches!(step.preprocess(&gradient()), Err(DropletError::InvalidInput(_))));
    }

    #[test]
    fn test_invert() {
        let out = InvertPreprocessor.preprocess(&RgbImage::from_pixel(2, 2, Rgb([0, 100, 255]))).unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgb([255, 155, 0]));
    }
}
