use image::{GrayImage, Luma, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    error::{DropletError, Result},
    types::{BinaryMask, LabelBuffer, LabelMap, BACKGROUND},
};

/// How [`threshold`] chooses its lower cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMode {
    /// Use the caller's `low_cut` as given
    Fixed,
    /// Maximize inter-class variance when no `low_cut` is supplied
    #[default]
    Otsu,
}

pub(crate) fn ensure_nonempty(dimensions: (u32, u32), what: &str) -> Result<()> {
    if dimensions.0 == 0 || dimensions.1 == 0 {
        return Err(DropletError::InvalidInput(format!("{what} is empty")));
    }
    Ok(())
}

fn ensure_element(size: u32) -> Result<()> {
    if size == 0 {
        return Err(DropletError::InvalidInput("structuring element size must be at least 1".into()));
    }
    Ok(())
}

/// Binarize `image`: foreground where `low < value <= high`.
///
/// With [`ThresholdMode::Otsu`] and no `low_cut`, the cut is the Otsu level of the image.
pub fn threshold(
    image: &GrayImage,
    low_cut: Option<u8>,
    high_cut: Option<u8>,
    mode: ThresholdMode,
) -> Result<BinaryMask> {
    ensure_nonempty(image.dimensions(), "threshold input")?;
    let low = match (mode, low_cut) {
        (_, Some(cut)) => cut,
        (ThresholdMode::Otsu, None) => imageproc::contrast::otsu_level(image),
        (ThresholdMode::Fixed, None) => {
            return Err(DropletError::InvalidInput("fixed threshold requires a low cut".into()))
        }
    };
    let high = high_cut.unwrap_or(u8::MAX);
    if high < low {
        return Err(DropletError::InvalidInput(format!("high cut {high} is below low cut {low}")));
    }
    Ok(BinaryMask::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0];
        v > low && v <= high
    }))
}

/// Otsu binarization shorthand
pub fn otsu_threshold(image: &GrayImage) -> Result<BinaryMask> {
    threshold(image, None, None, ThresholdMode::Otsu)
}

/// Window extent of a square element as (before, after) offsets.
///
/// Even sizes are not centered; dilation uses the reflected element so that
/// an opening neither shifts nor grows surviving regions.
fn erosion_extent(size: u32) -> (i64, i64) {
    (((size - 1) / 2) as i64, (size / 2) as i64)
}

fn dilation_extent(size: u32) -> (i64, i64) {
    let (before, after) = erosion_extent(size);
    (after, before)
}

/// Separable rank filter over a rectangular window; samples outside the grid read as `outside`
fn window_filter<T, F>(
    data: &[T],
    width: u32,
    height: u32,
    (before, after): (i64, i64),
    outside: T,
    pick: F,
) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let (w, h) = (width as i64, height as i64);
    let at = |x: i64, y: i64| (y * w + x) as usize;

    let mut horizontal = Vec::with_capacity(data.len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = if x - before < 0 || x + after >= w { outside } else { data[at(x, y)] };
            for nx in (x - before)..=(x + after) {
                if (0..w).contains(&nx) {
                    acc = pick(acc, data[at(nx, y)]);
                }
            }
            horizontal.push(acc);
        }
    }

    let mut out = Vec::with_capacity(data.len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = if y - before < 0 || y + after >= h { outside } else { horizontal[at(x, y)] };
            for ny in (y - before)..=(y + after) {
                if (0..h).contains(&ny) {
                    acc = pick(acc, horizontal[at(x, ny)]);
                }
            }
            out.push(acc);
        }
    }
    out
}

fn mask_filter(mask: &BinaryMask, extent: (i64, i64), pick: fn(u8, u8) -> u8) -> Result<BinaryMask> {
    let (width, height) = mask.dimensions();
    let data = window_filter(mask.as_image().as_raw(), width, height, extent, BACKGROUND, pick);
    let image = GrayImage::from_raw(width, height, data)
        .ok_or_else(|| DropletError::InvalidInput("mask buffer does not match its dimensions".into()))?;
    BinaryMask::from_gray(image)
}

/// Binary dilation with a `size`×`size` square, applied `iterations` times
pub fn dilate(mask: &BinaryMask, size: u32, iterations: u32) -> Result<BinaryMask> {
    ensure_nonempty(mask.dimensions(), "dilation input")?;
    ensure_element(size)?;
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = mask_filter(&out, dilation_extent(size), u8::max)?;
    }
    Ok(out)
}

/// Binary erosion with a `size`×`size` square, applied `iterations` times
pub fn erode(mask: &BinaryMask, size: u32, iterations: u32) -> Result<BinaryMask> {
    ensure_nonempty(mask.dimensions(), "erosion input")?;
    ensure_element(size)?;
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = mask_filter(&out, erosion_extent(size), u8::min)?;
    }
    Ok(out)
}

/// Morphological opening: erosion followed by dilation with the same element
pub fn open(mask: &BinaryMask, size: u32) -> Result<BinaryMask> {
    let eroded = erode(mask, size, 1)?;
    dilate(&eroded, size, 1)
}

/// Grayscale dilation of a label map: each pixel takes the largest label in its window
pub fn dilate_labels(labels: &LabelMap, size: u32) -> Result<LabelMap> {
    ensure_nonempty(labels.dimensions(), "label map")?;
    ensure_element(size)?;
    let (width, height) = labels.dimensions();
    let data = window_filter(labels.as_buffer().as_raw(), width, height, dilation_extent(size), 0, u32::max);
    let buffer = LabelBuffer::from_raw(width, height, data)
        .ok_or_else(|| DropletError::InvalidInput("label buffer does not match its dimensions".into()))?;
    Ok(LabelMap::from_buffer(buffer))
}

/// Median filter with a `(2 * radius + 1)` square window
pub fn median_blur(image: &GrayImage, radius: u32) -> Result<GrayImage> {
    ensure_nonempty(image.dimensions(), "median blur input")?;
    Ok(imageproc::filter::median_filter(image, radius, radius))
}

/// Photometric inversion, returns a new image
pub fn invert_gray(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    image::imageops::invert(&mut out);
    out
}

pub fn invert_rgb(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    image::imageops::invert(&mut out);
    out
}

/// Grayscale conversion of a color raster with BT.601 luma weights
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square(size: u32, lo: u32, hi: u32) -> BinaryMask {
        BinaryMask::from_fn(size, size, |x, y| (lo..=hi).contains(&x) && (lo..=hi).contains(&y))
    }

    #[test]
    fn test_dilate_and_erode_3x3() {
        let mask = square(10, 3, 6);
        assert_eq!(dilate(&mask, 3, 1).unwrap().foreground_count(), 36);
        assert_eq!(erode(&mask, 3, 1).unwrap().foreground_count(), 4);
        assert_eq!(dilate(&mask, 3, 2).unwrap().foreground_count(), 64);
    }

    #[test]
    fn test_erosion_treats_outside_as_background() {
        let full = BinaryMask::from_fn(5, 5, |_, _| true);
        let eroded = erode(&full, 3, 1).unwrap();
        assert!(!eroded.is_foreground(0, 0));
        assert!(eroded.is_foreground(2, 2));
        assert_eq!(eroded.foreground_count(), 9);
    }

    #[test]
    fn test_open_removes_specks_and_keeps_blocks() {
        let mut mask = square(20, 5, 12);
        mask.set(17, 17, true);
        for size in [3, 4, 5] {
            let opened = open(&mask, size).unwrap();
            assert!(!opened.is_foreground(17, 17));
            assert_eq!(opened.foreground_count(), 64, "size {size}");
            assert!(opened.is_foreground(5, 5) && opened.is_foreground(12, 12));
        }
    }

    #[test]
    fn test_zero_sized_element_rejected() {
        let mask = square(5, 1, 2);
        assert!(matches!(dilate(&mask, 0, 1), Err(DropletError::InvalidInput(_))));
    }

    #[test]
    fn test_primitives_reject_empty_rasters() {
        let empty = BinaryMask::new(0, 0);
        assert!(matches!(erode(&empty, 3, 1), Err(DropletError::InvalidInput(_))));
        assert!(matches!(otsu_threshold(&GrayImage::new(0, 3)), Err(DropletError::InvalidInput(_))));
    }

    #[test]
    fn test_otsu_splits_bimodal_image() {
        let image = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 30 } else { 200 }]));
        let mask = otsu_threshold(&image).unwrap();
        assert_eq!(mask.foreground_count(), 200);
        assert!(mask.is_foreground(15, 3));
        assert!(!mask.is_foreground(2, 3));
    }

    #[test]
    fn test_fixed_threshold_band() {
        let image = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 60) as u8]));
        let mask = threshold(&image, Some(50), Some(120), ThresholdMode::Fixed).unwrap();
        let row: Vec<bool> = (0..4).map(|x| mask.is_foreground(x, 0)).collect();
        assert_eq!(row, vec![false, true, true, false]);
        assert!(threshold(&image, None, None, ThresholdMode::Fixed).is_err());
    }

    #[test]
    fn test_dilate_labels_takes_window_max() {
        let labels = LabelMap::from_fn(7, 7, |x, y| if (x, y) == (3, 3) { 5 } else { 0 });
        let dilated = dilate_labels(&labels, 3).unwrap();
        assert_eq!(dilated.pixel_counts()[&5], 9);
        assert_eq!(labels.pixel_counts()[&5], 1);
    }

    #[test]
    fn test_gray_uses_bt601_weights() {
        let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [90, 90, 90], [255, 255, 255]];
        let image = RgbImage::from_fn(5, 1, |x, _| Rgb(colors[x as usize]));
        let gray = to_gray(&image);
        let values: Vec<u8> = gray.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![76, 150, 29, 90, 255]);
    }
}
