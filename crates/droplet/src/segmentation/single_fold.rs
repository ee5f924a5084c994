use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::{
    algorithms::{
        connected_components, dilate, distance_transform, erode, morphology::ensure_nonempty, threshold,
        watershed, Connectivity, ThresholdMode,
    },
    error::{DropletError, Result},
    types::{BinaryMask, FloodMap, LabelMap},
};

/// Smallest sentinel; marker values are spread below it so they stay distinguishable
pub const MIN_SENTINEL: u32 = 255;

/// Everything one watershed fold produces
#[derive(Debug, Clone)]
pub struct SingleFoldOutput {
    /// Inverted flood result (`sentinel - value`); lines and unreached pixels read as the sentinel
    pub border_map: LabelMap,
    /// Raw flood result with `-1` on watershed lines
    pub flood: FloodMap,
    /// Markers handed to the flood: spaced seed labels plus the sentinel border ring
    pub markers: LabelMap,
    pub seed_count: u32,
    pub sentinel: u32,
}

impl SingleFoldOutput {
    /// Droplet labels: the border map with sentinel pixels cleared
    pub fn droplet_labels(&self) -> LabelMap {
        let sentinel = self.sentinel;
        self.border_map.map(|v| if v == sentinel { 0 } else { v })
    }
}

/// Marker value for seed `label` out of `count`, and the sentinel above all of them.
///
/// Up to 254 seeds are spread evenly inside `0..255`; beyond that the 8-bit
/// spacing would collide, so labels are kept as-is and the sentinel moves up.
fn seed_layout(count: u32) -> (impl Fn(u32) -> u32, u32) {
    let sentinel = MIN_SENTINEL.max(count + 1);
    let spread = count < MIN_SENTINEL;
    let value = move |label: u32| {
        if label == 0 || !spread {
            label
        } else {
            (label as u64 * MIN_SENTINEL as u64 / (count as u64 + 1)) as u32
        }
    };
    (value, sentinel)
}

/// Ring of pixels ambiguous between foreground and background: the dilated
/// foreground minus its own erosion.
pub fn border_ring(foreground: &BinaryMask, element_size: u32) -> Result<BinaryMask> {
    let dilated = dilate(foreground, element_size, 1)?;
    let eroded = erode(&dilated, element_size, 1)?;
    dilated.difference(&eroded)
}

/// One watershed fold seeded from the distance transform of `foreground`
pub fn segment_on_distance(image: &GrayImage, foreground: &BinaryMask, border_threshold: u8) -> Result<SingleFoldOutput> {
    segment_on_distance_with_element(image, foreground, border_threshold, 3)
}

/// [`segment_on_distance`] with an explicit border element size
pub fn segment_on_distance_with_element(
    image: &GrayImage,
    foreground: &BinaryMask,
    border_threshold: u8,
    border_element_size: u32,
) -> Result<SingleFoldOutput> {
    ensure_nonempty(image.dimensions(), "segmentation image")?;
    if image.dimensions() != foreground.dimensions() {
        return Err(DropletError::dimension_mismatch(image.dimensions(), foreground.dimensions()));
    }

    let border = border_ring(foreground, border_element_size)?;

    let dt = distance_transform(foreground)?;
    let seeds = threshold(&dt, Some(border_threshold), None, ThresholdMode::Fixed)?;
    let (seed_labels, seed_count) = connected_components(&seeds, Connectivity::Four)?;

    let (spaced, sentinel) = seed_layout(seed_count);
    let markers = LabelMap::from_fn(image.width(), image.height(), |x, y| {
        if border.is_foreground(x, y) {
            sentinel
        } else {
            spaced(seed_labels.get(x, y))
        }
    });

    let color = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
    let flood = watershed(&color, &markers)?;

    let border_map = LabelMap::from_fn(image.width(), image.height(), |x, y| {
        sentinel - flood.get(x, y).max(0) as u32
    });

    debug!(
        seeds = seed_count,
        sentinel,
        border_pixels = border.foreground_count(),
        line_pixels = flood.line_pixel_count(),
        "watershed fold complete"
    );

    Ok(SingleFoldOutput { border_map, flood, markers, seed_count, sentinel })
}
