use std::collections::BTreeSet;

use image::{GrayImage, Luma, RgbImage};
use tracing::{debug, info};

use crate::{
    algorithms::{dilate_labels, invert_gray, invert_rgb, median_blur, morphology::ensure_nonempty, open, otsu_threshold, to_gray},
    config::SegmentationConfig,
    error::Result,
    segmentation::{
        cleanup::{remove_artifacts, remove_large_regions, remove_small_regions, SmallRegionCutoff},
        single_fold::{segment_on_distance_with_element, SingleFoldOutput},
    },
    types::{BinaryMask, LabelMap},
};

/// Intermediate results of the two-fold segmentation
#[derive(Debug, Clone)]
pub struct DoubleFoldReport {
    /// Flood result of the first fold with lines folded into background
    pub first_pass: LabelMap,
    pub removed_large: Vec<u32>,
    pub small_cutoff: Option<SmallRegionCutoff>,
    pub removed_small: Vec<u32>,
    pub rejected_artifacts: Vec<u32>,
    /// First pass after all region filters
    pub cleaned: LabelMap,
    /// Cleaned map dilated back to full droplet footprints; the segmentation result
    pub droplet_count: LabelMap,
    /// Droplet labels of the second fold run on the hole-filled image
    pub second_pass: LabelMap,
}

/// Median blur, Otsu and opening; returns the blurred image with its foreground
fn binarize(gray: &GrayImage, median_radius: u32, open_size: u32) -> Result<(GrayImage, BinaryMask)> {
    let blurred = median_blur(gray, median_radius)?;
    let foreground = open(&otsu_threshold(&blurred)?, open_size)?;
    Ok((blurred, foreground))
}

fn fold(image: &GrayImage, foreground: &BinaryMask, config: &SegmentationConfig) -> Result<SingleFoldOutput> {
    segment_on_distance_with_element(
        image,
        foreground,
        config.border_threshold,
        config.calibration.border_element_size,
    )
}

/// Single-fold path: invert, grayscale, blur, Otsu, open, one fold
pub fn single_fold_segment(image: &RgbImage, config: &SegmentationConfig) -> Result<LabelMap> {
    ensure_nonempty(image.dimensions(), "input image")?;
    let c = &config.calibration;
    let gray = to_gray(&invert_rgb(image));
    let (blurred, foreground) = binarize(&gray, c.median_radius, c.first_open_size)?;
    let output = fold(&blurred, &foreground, config)?;
    Ok(output.droplet_labels())
}

/// Dark fill for painted droplets: the mean of the distinct gray levels present, scaled down
fn fill_value(gray: &GrayImage, divisor: f64) -> u8 {
    let levels: BTreeSet<u8> = gray.pixels().map(|p| p[0]).collect();
    if levels.is_empty() {
        return 0;
    }
    let mean = levels.iter().map(|&l| l as f64).sum::<f64>() / levels.len() as f64;
    (mean / divisor).clamp(0.0, 255.0) as u8
}

/// Two folds with region cleanup in between
pub fn double_fold_segment(image: &RgbImage, config: &SegmentationConfig) -> Result<DoubleFoldReport> {
    ensure_nonempty(image.dimensions(), "input image")?;
    let c = &config.calibration;

    let gray = to_gray(image);
    let (blurred, foreground) = binarize(&gray, c.median_radius, c.first_open_size)?;
    let first = fold(&blurred, &foreground, config)?;
    let first_pass = first.flood.to_label_map();

    let (water, removed_large) = remove_large_regions(&first_pass, config.large_region_pixel_cap);
    let (water, small_cutoff, removed_small) =
        remove_small_regions(&water, c.gap_window, config.pixel_diff_threshold);

    if let (true, Some(cutoff)) = (config.plot_diagnostics, &small_cutoff) {
        info!(
            sorted_counts = ?cutoff.sorted_counts,
            gap_index = cutoff.gap_index,
            cutoff = cutoff.cutoff,
            applied = cutoff.applied,
            "first-fold element sizes"
        );
    }

    let (cleaned, rejected_artifacts) = if config.remove_artifacts {
        remove_artifacts(&water)
    } else {
        (water, Vec::new())
    };

    let droplet_count = dilate_labels(&cleaned, config.dilate_kernel_size)?;

    // Paint the grown droplets dark so the second fold sees filled interiors.
    let fill = fill_value(&gray, c.fill_divisor);
    let mut painted = gray;
    for (x, y, p) in painted.enumerate_pixels_mut() {
        if droplet_count.get(x, y) != 0 {
            *p = Luma([fill]);
        }
    }
    let second_foreground = open(&otsu_threshold(&invert_gray(&painted))?, c.second_open_size)?;
    let second = fold(&painted, &second_foreground, config)?;
    let second_pass = second.droplet_labels();

    debug!(
        first_regions = first_pass.region_count(),
        removed_large = removed_large.len(),
        removed_small = removed_small.len(),
        rejected_artifacts = rejected_artifacts.len(),
        droplets = droplet_count.region_count(),
        second_regions = second_pass.region_count(),
        "double fold complete"
    );

    Ok(DoubleFoldReport {
        first_pass,
        removed_large,
        small_cutoff,
        removed_small,
        rejected_artifacts,
        cleaned,
        droplet_count,
        second_pass,
    })
}

/// Segment `image` with one or two watershed folds as selected by `config.double_fold`
pub fn watershed_segment(image: &RgbImage, config: &SegmentationConfig) -> Result<LabelMap> {
    config.validate()?;
    if config.double_fold {
        Ok(double_fold_segment(image, config)?.droplet_count)
    } else {
        single_fold_segment(image, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_circle_mut;

    /// Dark droplets with bright centers on a light background
    fn droplet_image() -> RgbImage {
        let mut image = RgbImage::from_pixel(160, 120, Rgb([220, 220, 220]));
        for (i, &(cx, cy)) in CENTERS.iter().enumerate() {
            let r = 16 + (i as i32 % 3);
            draw_filled_circle_mut(&mut image, (cx, cy), r, Rgb([40, 40, 40]));
            draw_filled_circle_mut(&mut image, (cx, cy), 4, Rgb([200, 200, 200]));
        }
        image
    }

    fn double_config() -> SegmentationConfig {
        SegmentationConfig {
            double_fold: true,
            large_region_pixel_cap: 3_000,
            pixel_diff_threshold: 1_000,
            dilate_kernel_size: 3,
            remove_artifacts: true,
            ..SegmentationConfig::default()
        }
    }

    #[test]
    fn test_fill_value_uses_distinct_levels() {
        let gray = GrayImage::from_fn(10, 1, |x, _| Luma([if x < 9 { 0 } else { 200 }]));
        assert_eq!(fill_value(&gray, 4.0), 25);
    }

    #[test]
    fn test_double_fold_is_deterministic() {
        let image = droplet_image();
        let config = double_config();
        let a = watershed_segment(&image, &config).unwrap();
        let b = watershed_segment(&image, &config).unwrap();
        assert_eq!(a, b);
    }

    const CENTERS: [(i32, i32); 6] = [(30, 30), (80, 30), (130, 30), (30, 85), (80, 85), (130, 85)];

    #[test]
    fn test_double_fold_keeps_one_region_per_droplet() {
        let report = double_fold_segment(&droplet_image(), &double_config()).unwrap();

        // Only the two oversized regions around the droplets are dropped.
        assert_eq!(report.removed_large, vec![31, 255]);
        let cutoff = report.small_cutoff.as_ref().unwrap();
        assert!(!cutoff.applied);
        assert!(report.removed_small.is_empty());

        assert_eq!(report.droplet_count.region_count(), 6);
        let mut seen = BTreeSet::new();
        for (cx, cy) in CENTERS {
            let label = report.droplet_count.get(cx as u32, cy as u32);
            assert_ne!(label, 0, "droplet at ({cx}, {cy}) lost");
            assert!(seen.insert(label), "droplets share label {label}");
        }
        for label in report.cleaned.labels() {
            assert!(report.droplet_count.labels().contains(&label));
        }
        for label in &report.removed_large {
            assert!(!report.droplet_count.labels().contains(label));
        }
        assert!(report.droplet_count.foreground_pixels() > report.cleaned.foreground_pixels());

        assert_eq!(report.second_pass.region_count(), 6);
    }

    #[test]
    fn test_single_fold_finds_dark_droplets() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([245, 245, 245]));
        draw_filled_circle_mut(&mut image, (30, 50), 12, Rgb([10, 10, 10]));
        draw_filled_circle_mut(&mut image, (72, 50), 12, Rgb([10, 10, 10]));
        let config = SegmentationConfig { double_fold: false, ..SegmentationConfig::default() };
        let labels = watershed_segment(&image, &config).unwrap();
        assert_eq!(labels.region_count(), 2);
        let (left, right) = (labels.get(30, 50), labels.get(72, 50));
        assert_ne!(left, 0);
        assert_ne!(right, 0);
        assert_ne!(left, right);
        assert_eq!(labels.get(2, 2), 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = SegmentationConfig { dilate_kernel_size: 0, ..double_config() };
        let err = watershed_segment(&droplet_image(), &config).unwrap_err();
        assert!(matches!(err, crate::error::DropletError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = watershed_segment(&RgbImage::new(0, 0), &double_config()).unwrap_err();
        assert!(matches!(err, crate::error::DropletError::InvalidInput(_)));
    }
}
