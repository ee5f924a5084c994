//! # Droplet Segmentation and Scoring
//!
//! Segments droplets in microscopy rasters with marker-based watershed and
//! scores the result, so an outer optimizer can tune the process parameters
//! that produced the droplets.
//!
//! ## Core Features
//!
//! - **Morphology primitives**: thresholding, dilation/erosion/opening, distance transform, connected components
//! - **Watershed segmentation**: single fold or two folds with region cleanup in between
//! - **Loss scoring**: yield loss (count and coverage) and geometric loss (circularity)
//! - **Pipeline System**: rotate/crop preprocessing, segmentation and scoring in one composable run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use droplet::{io::load_rgb, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .with_rotate_crop(1.5, 40, 600, 20, 460)
//!     .build()?;
//!
//! let image = load_rgb("sample.png")?;
//! let result = pipeline.process("sample", &image)?;
//! println!("total loss {}", result.score.total_loss);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithms;
pub mod config;
pub mod error;
pub mod io;
pub mod loss;
pub mod optimizer;
pub mod pipeline;
pub mod segmentation;
pub mod traits;
pub mod types;

pub use config::{CircleFitStrategy, LossConfig, SegmentationCalibration, SegmentationConfig};
pub use error::{DropletError, Result};
pub use loss::{geometric_loss, yield_loss, LossScorer, SampleScore};
pub use optimizer::Observation;
pub use pipeline::{builder::PipelineBuilder, Pipeline, ScoredSample};
pub use segmentation::{segment_on_distance, watershed_segment, DoubleFoldReport, WatershedSegmenter};
pub use traits::*;
pub use types::{BinaryMask, DropletRecord, FloodMap, LabelMap, Region};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;

    fn disk_mask() -> BinaryMask {
        let mut image = GrayImage::new(100, 100);
        draw_filled_circle_mut(&mut image, (50, 50), 10, Luma([255]));
        BinaryMask::from_gray(image).unwrap()
    }

    #[test]
    fn test_single_disk_end_to_end() {
        let mask = disk_mask();
        let labels = segment_on_distance(mask.as_image(), &mask, 0).unwrap().droplet_labels();
        assert_eq!(labels.region_count(), 1);
        let area = labels.foreground_pixels() as f64;
        assert!((area - std::f64::consts::PI * 100.0).abs() <= 2.0 * std::f64::consts::PI * 10.0);

        let geometric = geometric_loss(&labels, "disk", &loss::MidpointSpanEstimator).unwrap();
        assert!(geometric.value < 0.05, "geometric {}", geometric.value);

        // With no slack a single droplet exactly meets an estimate of one.
        let yld = yield_loss(&labels, 1.0, 1.0);
        assert_eq!(yld.count_loss, 0.0);
        assert!((yld.area_loss - 0.969).abs() < 0.005, "area {}", yld.area_loss);

        let slack = yield_loss(&labels, 1.0, 1.5);
        assert!((slack.count_loss - 1.0 / 3.0).abs() < 1e-12);
    }

    fn droplet_sheet() -> RgbImage {
        let mut image = RgbImage::from_pixel(140, 100, Rgb([230, 230, 230]));
        for &(cx, cy) in &[(30, 30), (75, 30), (115, 35), (35, 72), (80, 72)] {
            draw_filled_circle_mut(&mut image, (cx, cy), 15, Rgb([35, 35, 35]));
        }
        image
    }

    #[test]
    fn test_pipeline_scores_synthetic_sheet() {
        let pipeline = Pipeline::builder()
            .with_segmentation(SegmentationConfig { double_fold: false, ..SegmentationConfig::default() })
            .build()
            .unwrap();
        let result = pipeline.process("sheet", &droplet_sheet()).unwrap();
        assert_eq!(result.score.region_count, 5);
        assert!(result.score.geometric_loss < 0.2);
        assert_eq!(result.score.records.len(), result.score.region_count);
        assert!(result.score.total_loss.is_finite());
        assert!(result.score.records.iter().all(|r| r.sample_id == "sheet"));
    }

    #[test]
    fn test_inversion_step_restores_dark_droplets() {
        let sheet = droplet_sheet();
        let mut negative = sheet.clone();
        for p in negative.pixels_mut() {
            *p = Rgb([255 - p[0], 255 - p[1], 255 - p[2]]);
        }
        let segmentation = SegmentationConfig { double_fold: false, ..SegmentationConfig::default() };
        let plain = Pipeline::builder().with_segmentation(segmentation.clone()).build().unwrap();
        let inverting = Pipeline::builder()
            .with_inversion()
            .with_segmentation(segmentation)
            .set_circle_estimator(loss::CentroidEstimator)
            .build()
            .unwrap();
        assert!(inverting.info().starts_with("Pipeline: 1 preprocessors"), "{}", inverting.info());
        assert!(plain.info().starts_with("Pipeline: 0 preprocessors"));

        let expected = plain.segment(&sheet).unwrap();
        let result = inverting.process("negative", &negative).unwrap();
        assert_eq!(result.labels, expected);
        assert_eq!(result.score.region_count, 5);
        assert!(result.score.geometric_loss < 0.2);
    }

    #[test]
    fn test_pipeline_crop_changes_raster_size() {
        let pipeline = Pipeline::builder()
            .with_rotate_crop(0.0, 10, 110, 5, 95)
            .with_segmentation(SegmentationConfig { double_fold: false, ..SegmentationConfig::default() })
            .build()
            .unwrap();
        let labels = pipeline.segment(&droplet_sheet()).unwrap();
        assert_eq!(labels.dimensions(), (100, 90));
    }

    #[test]
    fn test_pipeline_rejects_bad_crop() {
        let pipeline = Pipeline::builder().with_rotate_crop(0.0, 10, 500, 0, 50).build().unwrap();
        let result = pipeline.process("bad", &droplet_sheet());
        assert!(matches!(result, Err(DropletError::InvalidInput(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Pipeline::builder()
            .with_segmentation(SegmentationConfig { dilate_kernel_size: 0, ..SegmentationConfig::default() })
            .build();
        assert!(matches!(result, Err(DropletError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_blank_sample_is_empty_segmentation() {
        struct Nothing;
        impl Segmenter for Nothing {
            fn segment(&self, image: &RgbImage) -> Result<LabelMap> {
                Ok(LabelMap::new(image.width(), image.height()))
            }
        }
        let pipeline = Pipeline::builder().set_segmenter(Nothing).build().unwrap();
        let result = pipeline.process("blank", &RgbImage::new(20, 20));
        assert!(matches!(result, Err(DropletError::EmptySegmentation)));
    }
}
