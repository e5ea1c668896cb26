use image::{DynamicImage, GrayImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use tracing::debug;

use crate::models::BoundingBox;

/// Data that flows through the pipeline
/// Each PipelineData represents a single image region with associated metadata
#[derive(Clone)]
pub struct PipelineData {
    /// The image data (can be grayscale, binary or color)
    pub image: DynamicImage,

    /// Reference to the original page raster (shared efficiently via Arc)
    pub original: Arc<DynamicImage>,

    /// Enhanced grayscale of the whole page, once contrast and denoising ran
    pub enhanced: Option<Arc<GrayImage>>,

    /// Bounding box in the original image (None means full image)
    pub bbox: Option<BoundingBox>,

    /// Metadata for tracking properties (e.g., "area", "aspect_ratio")
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone)]
pub enum MetadataValue {
    Float(f64),
    Int(i64),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            enhanced: None,
            bbox: None,
            metadata: HashMap::new(),
        }
    }

    /// Create PipelineData for a region of an image
    pub fn from_region(
        image: DynamicImage,
        original: Arc<DynamicImage>,
        enhanced: Option<Arc<GrayImage>>,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            image,
            original,
            enhanced,
            bbox: Some(bbox),
            metadata: HashMap::new(),
        }
    }

    /// Same item with a new image, everything else carried over
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            enhanced: self.enhanced.clone(),
            bbox: self.bbox,
            metadata: self.metadata.clone(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get metadata as float
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as int
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Debug outputs go to an empty (or not yet existing) directory
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self { output_dir })
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    /// 1-based page the pipeline is running on
    pub page: u32,
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    fn debug_dir(&self) -> Option<PathBuf> {
        self.debug
            .as_ref()
            .map(|d| d.output_dir.join(format!("page_{}", self.page)))
    }
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and error reports)
    fn name(&self) -> &str;
}

/// A step failed; carries the step name so callers can report the stage
#[derive(Debug)]
pub struct StepFailure {
    pub step: String,
    pub error: anyhow::Error,
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext {
                page: 1,
                debug: None,
            },
        }
    }

    /// Page number used for logs and debug output folders
    pub fn with_page(mut self, page: u32) -> Self {
        self.context.page = page;
        self
    }

    /// Enable debug mode
    pub fn with_debug(mut self, debug: Option<DebugConfig>) -> Self {
        self.context.debug = debug;
        self
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline sequentially on an input image
    pub fn run(&self, input: DynamicImage) -> std::result::Result<Vec<PipelineData>, StepFailure> {
        let debug_dir = self.context.debug_dir();

        if let Some(dir) = &debug_dir {
            save_debug_images(&dir.join("00_input"), std::slice::from_ref(&input)).map_err(|error| {
                StepFailure { step: "Debug Output".to_string(), error }
            })?;
        }

        // Start with a single PipelineData containing the full image
        let mut data = vec![PipelineData::from_image(input)];

        for (step_idx, step) in self.steps.iter().enumerate() {
            let step_name = step.name();
            debug!(page = self.context.page, items = data.len(), "Running step: {}", step_name);

            data = step.process(data, &self.context).map_err(|error| StepFailure {
                step: step_name.to_string(),
                error,
            })?;

            if let Some(dir) = &debug_dir {
                let step_dir = dir.join(format!(
                    "{:02}_{}",
                    step_idx + 1,
                    step_name.to_lowercase().replace(' ', "_")
                ));
                let images: Vec<DynamicImage> = data.iter().map(|d| d.image.clone()).collect();
                save_debug_images(&step_dir, &images).map_err(|error| StepFailure {
                    step: step_name.to_string(),
                    error,
                })?;
            }

            debug!(page = self.context.page, "  → {} items", data.len());
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn save_debug_images(step_dir: &Path, images: &[DynamicImage]) -> Result<()> {
    std::fs::create_dir_all(step_dir)?;
    for (idx, image) in images.iter().enumerate() {
        let output_path = step_dir.join(format!("{:02}.png", idx + 1));
        image
            .save(&output_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
    }
    debug!("Debug: saved {} images to {}", images.len(), step_dir.display());
    Ok(())
}
