pub mod analysis;
pub mod artifacts;
pub mod config;
pub mod descriptors;
pub mod detection;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod raster;
pub mod store;

pub use analysis::{AnalysisReport, ClusterAnalyzer, ClusterOutcome, SizeStats};
pub use config::{ClusterConfig, DescriptorConfig, DetectorConfig, PipelineConfig};
pub use descriptors::DescriptorExtractor;
pub use detection::{PageRegions, RegionDetector};
pub use error::{Error, Result};
pub use extractor::{RunPaths, RunSummary, SymbolExtractor};
pub use models::{BoundingBox, Catalog, CatalogBuilder, ClusterLabel, Descriptor, Symbol, SymbolId};
pub use pipeline::{DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep, MetadataValue};
pub use store::{CatalogStore, PersistedCatalog, SymbolRecord};
