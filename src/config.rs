//! Tunables for every pipeline stage.
//!
//! Every struct deserializes with per-field defaults so a JSON config file
//! only needs to name the values it changes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How candidate regions are measured against `min_area`/`max_area`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMeasure {
    /// `width * height` of the bounding box
    BoundingBox,
    /// Polygon area enclosed by the traced contour
    Contour,
}

/// Order in which accepted regions are numbered on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionOrder {
    /// Raster-scan order in which the contour tracer found the blobs
    Discovery,
    /// Top-to-bottom, then left-to-right by bounding-box origin
    Reading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub contrast_clip_limit: f32,
    pub contrast_tile_size: u32,
    pub denoise_strength: f32,
    pub denoise_template_window: u32,
    pub denoise_search_window: u32,
    pub adaptive_block_size: u32,
    pub adaptive_c: f32,
    pub morph_kernel_size: u32,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub area_measure: AreaMeasure,
    pub region_order: RegionOrder,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contrast_clip_limit: 2.0,
            contrast_tile_size: 8,
            denoise_strength: 10.0,
            denoise_template_window: 7,
            denoise_search_window: 21,
            adaptive_block_size: 15,
            adaptive_c: 10.0,
            morph_kernel_size: 3,
            min_area: 50.0,
            max_area: 5000.0,
            min_aspect_ratio: 0.2,
            max_aspect_ratio: 5.0,
            area_measure: AreaMeasure::BoundingBox,
            region_order: RegionOrder::Discovery,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.contrast_tile_size == 0 {
            return Err(Error::Config("contrast_tile_size must be at least 1".into()));
        }
        if !(self.contrast_clip_limit > 0.0) {
            return Err(Error::Config("contrast_clip_limit must be positive".into()));
        }
        if self.denoise_strength < 0.0 {
            return Err(Error::Config("denoise_strength must not be negative".into()));
        }
        for (name, value) in [
            ("denoise_template_window", self.denoise_template_window),
            ("denoise_search_window", self.denoise_search_window),
        ] {
            if value == 0 || value % 2 == 0 {
                return Err(Error::Config(format!("{name} must be odd, got {value}")));
            }
        }
        if self.adaptive_block_size < 3 || self.adaptive_block_size % 2 == 0 {
            return Err(Error::Config(format!(
                "adaptive_block_size must be odd and at least 3, got {}",
                self.adaptive_block_size
            )));
        }
        if self.morph_kernel_size == 0 || self.morph_kernel_size > 255 {
            return Err(Error::Config("morph_kernel_size must be in 1..=255".into()));
        }
        if self.min_area < 0.0 || self.min_area > self.max_area {
            return Err(Error::Config(format!(
                "area range [{}, {}] is empty",
                self.min_area, self.max_area
            )));
        }
        if self.min_aspect_ratio <= 0.0 || self.min_aspect_ratio > self.max_aspect_ratio {
            return Err(Error::Config(format!(
                "aspect ratio range [{}, {}] is empty",
                self.min_aspect_ratio, self.max_aspect_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Intensity difference for a FAST-9 corner
    pub fast_threshold: u8,
    /// Side of the square patch sampled by the binary tests (odd)
    pub patch_size: u32,
    pub max_keypoints: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            patch_size: 15,
            max_keypoints: 500,
        }
    }
}

impl DescriptorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.patch_size < 5 || self.patch_size % 2 == 0 {
            return Err(Error::Config(format!(
                "patch_size must be odd and at least 5, got {}",
                self.patch_size
            )));
        }
        if self.max_keypoints == 0 {
            return Err(Error::Config("max_keypoints must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub pca_components: usize,
    pub num_clusters: usize,
    pub random_seed: u64,
    /// k-means restarts; the lowest-inertia run wins
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            pca_components: 10,
            num_clusters: 10,
            random_seed: 42,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pca_components == 0 {
            return Err(Error::Config("pca_components must be at least 1".into()));
        }
        if self.num_clusters == 0 {
            return Err(Error::Config("num_clusters must be at least 1".into()));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(Error::Config("n_init and max_iter must be at least 1".into()));
        }
        Ok(())
    }
}

/// Full configuration of one extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub descriptor: DescriptorConfig,
    pub cluster: ClusterConfig,
    /// Resolution used when rasterizing PDF pages
    pub dpi: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            descriptor: DescriptorConfig::default(),
            cluster: ClusterConfig::default(),
            dpi: 200.0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.descriptor.validate()?;
        self.cluster.validate()?;
        if !(self.dpi > 0.0) {
            return Err(Error::Config("dpi must be positive".into()));
        }
        Ok(())
    }
}
