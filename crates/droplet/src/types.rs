use std::collections::{BTreeMap, BTreeSet};

use image::{GrayImage, ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DropletError, Result};

/// Pixel value used for foreground in a [`BinaryMask`]
pub const FOREGROUND: u8 = 255;
/// Pixel value used for background in a [`BinaryMask`]
pub const BACKGROUND: u8 = 0;
/// Marker written by the flood along watershed lines
pub const WATERSHED_LINE: i32 = -1;

/// Raw label buffer, the same layout `imageproc::region_labelling` produces
pub type LabelBuffer = ImageBuffer<Luma<u32>, Vec<u32>>;

/// A two-valued raster: every pixel is either [`FOREGROUND`] or [`BACKGROUND`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// All-background mask of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: GrayImage::new(width, height) }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { image }
    }

    /// Wrap a grayscale image, rejecting any pixel that is not 0 or 255
    pub fn from_gray(image: GrayImage) -> Result<Self> {
        if let Some(p) = image.pixels().find(|p| p[0] != FOREGROUND && p[0] != BACKGROUND) {
            return Err(DropletError::InvalidInput(format!(
                "binary mask contains non-binary value {}",
                p[0]
            )));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.image.put_pixel(x, y, Luma([value]));
    }

    pub fn foreground_count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] == FOREGROUND).count()
    }

    /// Pixels set here but not in `other`
    pub fn difference(&self, other: &BinaryMask) -> Result<BinaryMask> {
        if self.dimensions() != other.dimensions() {
            return Err(DropletError::dimension_mismatch(self.dimensions(), other.dimensions()));
        }
        let (width, height) = self.dimensions();
        Ok(Self::from_fn(width, height, |x, y| {
            self.is_foreground(x, y) && !other.is_foreground(x, y)
        }))
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

/// Result of the marker flood: `-1` on watershed lines, marker values elsewhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodMap {
    width: u32,
    height: u32,
    data: Vec<i32>,
}

impl FloodMap {
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<i32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn line_pixel_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == WATERSHED_LINE).count()
    }

    /// Label map with watershed lines folded into the background
    pub fn to_label_map(&self) -> LabelMap {
        let buffer = LabelBuffer::from_fn(self.width, self.height, |x, y| {
            Luma([self.get(x, y).max(0) as u32])
        });
        LabelMap::from_buffer(buffer)
    }
}

/// One labelled region gathered from a [`LabelMap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub label: u32,
    pub pixels: Vec<(u32, u32)>,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl Region {
    fn new(label: u32, x: u32, y: u32) -> Self {
        Self {
            label,
            pixels: vec![(x, y)],
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn push(&mut self, x: u32, y: u32) {
        self.pixels.push((x, y));
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn bbox_width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn bbox_height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Pixel count of each row inside the bounding box, top to bottom
    pub fn row_profile(&self) -> Vec<u32> {
        let mut profile = vec![0u32; self.bbox_height() as usize];
        for &(_, y) in &self.pixels {
            profile[(y - self.min_y) as usize] += 1;
        }
        profile
    }

    /// Pixel count of each column inside the bounding box, left to right
    pub fn column_profile(&self) -> Vec<u32> {
        let mut profile = vec![0u32; self.bbox_width() as usize];
        for &(x, _) in &self.pixels {
            profile[(x - self.min_x) as usize] += 1;
        }
        profile
    }
}

/// Per-droplet label raster; `0` is background and labels need not be contiguous.
///
/// Every filtering operation returns a new map, the receiver is never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: LabelBuffer,
}

impl LabelMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self { labels: LabelBuffer::new(width, height) }
    }

    pub fn from_buffer(labels: LabelBuffer) -> Self {
        Self { labels }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> u32,
    {
        Self { labels: LabelBuffer::from_fn(width, height, |x, y| Luma([f(x, y)])) }
    }

    pub fn width(&self) -> u32 {
        self.labels.width()
    }

    pub fn height(&self) -> u32 {
        self.labels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.labels.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y)[0]
    }

    pub fn as_buffer(&self) -> &LabelBuffer {
        &self.labels
    }

    pub fn into_buffer(self) -> LabelBuffer {
        self.labels
    }

    pub fn total_pixels(&self) -> usize {
        self.labels.width() as usize * self.labels.height() as usize
    }

    pub fn background_pixels(&self) -> usize {
        self.labels.pixels().filter(|p| p[0] == 0).count()
    }

    pub fn foreground_pixels(&self) -> usize {
        self.total_pixels() - self.background_pixels()
    }

    /// Pixel count per non-background label, in ascending label order
    pub fn pixel_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for p in self.labels.pixels().filter(|p| p[0] != 0) {
            *counts.entry(p[0]).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct non-background labels, ascending
    pub fn labels(&self) -> Vec<u32> {
        self.pixel_counts().into_keys().collect()
    }

    pub fn region_count(&self) -> usize {
        self.pixel_counts().len()
    }

    /// Gather every non-background region with its pixels and bounding box
    pub fn regions(&self) -> BTreeMap<u32, Region> {
        let mut regions: BTreeMap<u32, Region> = BTreeMap::new();
        for (x, y, p) in self.labels.enumerate_pixels() {
            let label = p[0];
            if label == 0 {
                continue;
            }
            regions
                .entry(label)
                .and_modify(|r| r.push(x, y))
                .or_insert_with(|| Region::new(label, x, y));
        }
        regions
    }

    /// Binary mask of a single label
    pub fn region_mask(&self, label: u32) -> BinaryMask {
        BinaryMask::from_fn(self.width(), self.height(), |x, y| label != 0 && self.get(x, y) == label)
    }

    /// Copy with every label in `remove` set to background
    pub fn without_labels(&self, remove: &BTreeSet<u32>) -> LabelMap {
        self.map(|v| if remove.contains(&v) { 0 } else { v })
    }

    /// Copy with `f` applied to every pixel value
    pub fn map<F>(&self, mut f: F) -> LabelMap
    where
        F: FnMut(u32) -> u32,
    {
        let mut labels = self.labels.clone();
        for p in labels.pixels_mut() {
            p[0] = f(p[0]);
        }
        Self { labels }
    }

    /// Foreground mask of every non-background pixel
    pub fn foreground_mask(&self) -> BinaryMask {
        BinaryMask::from_fn(self.width(), self.height(), |x, y| self.get(x, y) != 0)
    }
}

/// Geometric descriptors of one droplet, one row of the persisted table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DropletRecord {
    pub sample_id: String,
    pub label: u32,
    pub centroid_x: u32,
    pub centroid_y: u32,
    pub diameter_x: f64,
    pub diameter_y: f64,
    pub pixel_count: usize,
}
