use std::path::Path;

use image::{ImageBuffer, Luma, RgbImage};

use crate::{
    error::{DropletError, Result},
    types::LabelMap,
};

/// 16-bit grayscale raster, the on-disk form of a label map
pub type Label16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Load any supported image file as 8-bit RGB
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

impl LabelMap {
    /// Narrow to 16 bits; fails if any label does not fit
    pub fn to_luma16(&self) -> Result<Label16Image> {
        if let Some(&label) = self.labels().iter().find(|&&l| l > u16::MAX as u32) {
            return Err(DropletError::InvalidInput(format!("label {label} does not fit a 16-bit raster")));
        }
        Ok(Label16Image::from_fn(self.width(), self.height(), |x, y| Luma([self.get(x, y) as u16])))
    }

    pub fn from_luma16(image: &Label16Image) -> Self {
        LabelMap::from_fn(image.width(), image.height(), |x, y| image.get_pixel(x, y)[0] as u32)
    }

    /// Save as a 16-bit grayscale image; the format follows the file extension
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_luma16()?.save(path)?;
        Ok(())
    }

    pub fn load_png(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_luma16(&image::open(path)?.to_luma16()))
    }
}
