pub mod preprocessing;
pub mod contours;
pub mod steps;

use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::models::BoundingBox;
use crate::pipeline::{DebugConfig, Pipeline};

/// Candidate symbol regions of one page
pub struct PageRegions {
    pub regions: Vec<BoundingBox>,
    /// Contrast-enhanced, denoised page the descriptors are computed on.
    /// None when no region survived filtering.
    pub enhanced: Option<GrayImage>,
}

/// Finds candidate symbol regions on page rasters
pub struct RegionDetector {
    config: DetectorConfig,
    debug: Option<DebugConfig>,
}

impl RegionDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, debug: None })
    }

    /// Dump every intermediate image under the debug directory
    pub fn with_debug(mut self, debug: Option<DebugConfig>) -> Self {
        self.debug = debug;
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The step pipeline used for one page
    pub fn build_pipeline(&self, page: u32) -> Pipeline {
        build_standard_pipeline(&self.config)
            .with_page(page)
            .with_debug(self.debug.clone())
    }

    /// Run the detection pipeline on a page raster
    pub fn detect(&self, page: u32, img: &DynamicImage) -> Result<PageRegions> {
        let outputs = self
            .build_pipeline(page)
            .run(img.clone())
            .map_err(|failure| Error::RegionDetection {
                page,
                stage: failure.step,
                reason: format!("{:#}", failure.error),
            })?;

        let regions: Vec<BoundingBox> = outputs.iter().filter_map(|item| item.bbox).collect();

        // Region items all share the page's enhanced image
        let enhanced = outputs
            .first()
            .and_then(|item| item.enhanced.clone())
            .map(Arc::unwrap_or_clone);

        debug!(page, regions = regions.len(), "Region detection finished");
        Ok(PageRegions { regions, enhanced })
    }
}

/// Build the standard region detection pipeline using the composable pipeline system
pub fn build_standard_pipeline(config: &DetectorConfig) -> Pipeline {
    use steps::*;

    Pipeline::new()
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(ContrastEnhanceStep {
            clip_limit: config.contrast_clip_limit,
            tile_grid: config.contrast_tile_size,
        }))
        .add_step(Arc::new(DenoiseStep {
            strength: config.denoise_strength,
            template_window: config.denoise_template_window,
            search_window: config.denoise_search_window,
        }))
        .add_step(Arc::new(AdaptiveThresholdStep {
            block_size: config.adaptive_block_size,
            c: config.adaptive_c,
        }))
        .add_step(Arc::new(MorphologyStep {
            kernel_size: config.morph_kernel_size,
        }))
        .add_step(Arc::new(ContourDetectionStep {
            order: config.region_order,
        }))
        .add_step(Arc::new(RegionFilterStep {
            min_area: config.min_area,
            max_area: config.max_area,
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
            measure: config.area_measure,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_stage_order() {
        let pipeline = build_standard_pipeline(&DetectorConfig::default());
        assert_eq!(
            pipeline.step_names(),
            vec![
                "Grayscale Conversion",
                "Contrast Enhancement",
                "Denoise",
                "Adaptive Threshold",
                "Morphology",
                "Contour Detection",
                "Region Filtering",
            ]
        );
    }

    #[test]
    fn rejects_even_block_size() {
        let config = DetectorConfig {
            adaptive_block_size: 14,
            ..DetectorConfig::default()
        };
        assert!(matches!(RegionDetector::new(config), Err(Error::Config(_))));
    }
}
