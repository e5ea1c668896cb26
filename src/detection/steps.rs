use crate::config::{AreaMeasure, RegionOrder};
use crate::detection::{contours, preprocessing};
use crate::models::BoundingBox;
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep};
use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use tracing::debug;

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let (width, height) = item.image.dimensions();
            if width == 0 || height == 0 {
                return Err(anyhow::anyhow!("page raster is empty ({}x{})", width, height));
            }
            let gray = preprocessing::to_grayscale(&item.image);
            result.push(item.with_image(DynamicImage::ImageLuma8(gray)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Local contrast enhancement (CLAHE)
pub struct ContrastEnhanceStep {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl PipelineStep for ContrastEnhanceStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let enhanced = preprocessing::equalize_local(&gray, self.clip_limit, self.tile_grid);
            result.push(item.with_image(DynamicImage::ImageLuma8(enhanced)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Contrast Enhancement"
    }
}

/// Non-local means denoising. Its output is kept as the enhanced page that
/// later crops and descriptors are taken from.
pub struct DenoiseStep {
    pub strength: f32,
    pub template_window: u32,
    pub search_window: u32,
}

impl PipelineStep for DenoiseStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let denoised = preprocessing::denoise_nl_means(
                &gray,
                self.strength,
                self.template_window,
                self.search_window,
            );
            let mut new_item = item.with_image(DynamicImage::ImageLuma8(denoised.clone()));
            new_item.enhanced = Some(Arc::new(denoised));
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Denoise"
    }
}

/// Gaussian adaptive threshold producing an inverted mask (ink = 255)
pub struct AdaptiveThresholdStep {
    pub block_size: u32,
    pub c: f32,
}

impl PipelineStep for AdaptiveThresholdStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let mask = preprocessing::adaptive_threshold_gaussian(&gray, self.block_size, self.c);
            result.push(item.with_image(DynamicImage::ImageLuma8(mask)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }
}

/// One opening followed by one closing with a square kernel
pub struct MorphologyStep {
    pub kernel_size: u32,
}

impl PipelineStep for MorphologyStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let mask = item.image.to_luma8();
            let opened = preprocessing::open(&mask, self.kernel_size);
            let closed = preprocessing::close(&opened, self.kernel_size);
            result.push(item.with_image(DynamicImage::ImageLuma8(closed)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Morphology"
    }
}

/// Trace external contours on the mask - splits one page into many regions
pub struct ContourDetectionStep {
    pub order: RegionOrder,
}

impl PipelineStep for ContourDetectionStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let mask = item.image.to_luma8();
            let (img_width, img_height) = item.original.as_ref().dimensions();

            let mut regions: Vec<(BoundingBox, f64)> = contours::find_external_contours(&mask)
                .iter()
                .filter_map(|contour| {
                    let bbox = contour.bounding_box()?.clamp_to(img_width, img_height)?;
                    Some((bbox, contour.area()))
                })
                .collect();

            if self.order == RegionOrder::Reading {
                regions.sort_by_key(|(bbox, _)| (bbox.y, bbox.x));
            }

            debug!(page = context.page, "Found {} external contours", regions.len());

            // Each contour becomes its own PipelineData
            for (bbox, contour_area) in regions {
                let cropped = item.original.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
                let region = PipelineData::from_region(
                    cropped,
                    item.original.clone(),
                    item.enhanced.clone(),
                    bbox,
                )
                .with_metadata("contour_area", MetadataValue::Float(contour_area))
                .with_metadata("bbox_area", MetadataValue::Int(bbox.area() as i64))
                .with_metadata("aspect_ratio", MetadataValue::Float(bbox.aspect_ratio()));

                result.push(region);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Contour Detection"
    }
}

/// Keep regions whose area and aspect ratio fall inside the configured ranges
pub struct RegionFilterStep {
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub measure: AreaMeasure,
}

impl RegionFilterStep {
    pub fn accepts(&self, area: f64, aspect_ratio: f64) -> bool {
        area >= self.min_area
            && area <= self.max_area
            && aspect_ratio >= self.min_aspect_ratio
            && aspect_ratio <= self.max_aspect_ratio
    }
}

impl PipelineStep for RegionFilterStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let total = data.len();
        let mut result = Vec::new();

        for item in data {
            let area = match self.measure {
                AreaMeasure::BoundingBox => item.get_int("bbox_area").map(|a| a as f64),
                AreaMeasure::Contour => item.get_float("contour_area"),
            }
            .ok_or_else(|| anyhow::anyhow!("Missing area metadata"))?;
            let aspect_ratio = item
                .get_float("aspect_ratio")
                .ok_or_else(|| anyhow::anyhow!("Missing aspect_ratio"))?;

            if self.accepts(area, aspect_ratio) {
                result.push(item);
            }
        }

        debug!(page = context.page, "Kept {} of {} regions", result.len(), total);
        Ok(result)
    }

    fn name(&self) -> &str {
        "Region Filtering"
    }
}
