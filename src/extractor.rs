use std::path::PathBuf;

use image::imageops;
use tracing::info;

use crate::analysis::{AnalysisReport, ClusterAnalyzer};
use crate::artifacts::{ArtifactSink, DirectorySink};
use crate::config::PipelineConfig;
use crate::descriptors::DescriptorExtractor;
use crate::detection::RegionDetector;
use crate::error::Result;
use crate::models::{Catalog, CatalogBuilder};
use crate::pipeline::DebugConfig;
use crate::raster::{rasterize_all, rasterizer_for, Page, Rasterizer};
use crate::store::{CatalogStore, MergeSummary};

/// Inputs and outputs of one run
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub document: PathBuf,
    pub output_dir: PathBuf,
    pub catalog: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pages: u32,
    pub symbols: usize,
    pub symbols_with_descriptors: usize,
    pub report: AnalysisReport,
    pub merge: MergeSummary,
}

/// Runs the whole document pipeline: rasterize, detect, describe, cluster, persist
pub struct SymbolExtractor {
    paths: RunPaths,
    config: PipelineConfig,
    detector: RegionDetector,
    descriptors: DescriptorExtractor,
    analyzer: ClusterAnalyzer,
}

impl SymbolExtractor {
    pub fn new(paths: RunPaths, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: RegionDetector::new(config.detector.clone())?,
            descriptors: DescriptorExtractor::new(config.descriptor.clone())?,
            analyzer: ClusterAnalyzer::new(config.cluster.clone())?,
            paths,
            config,
        })
    }

    /// Dump intermediate detection images for every page
    pub fn with_debug(mut self, debug: Option<DebugConfig>) -> Self {
        self.detector = self.detector.with_debug(debug);
        self
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Process the document end to end with the default rasterizer and
    /// artifacts written to the output directory. Nothing is written until
    /// every page has been rendered.
    pub fn run(&self) -> Result<RunSummary> {
        info!("Processing document {}", self.paths.document.display());
        let rasterizer = rasterizer_for(&self.paths.document, self.config.dpi)?;
        let pages = self.rasterize(rasterizer.as_ref())?;
        let sink = DirectorySink::new(&self.paths.output_dir)?;
        self.run_pages(&pages, &sink)
    }

    pub fn run_with(&self, rasterizer: &dyn Rasterizer, sink: &dyn ArtifactSink) -> Result<RunSummary> {
        let pages = self.rasterize(rasterizer)?;
        self.run_pages(&pages, sink)
    }

    /// Extract, analyze and persist already rendered pages
    pub fn run_pages(&self, pages: &[Page], sink: &dyn ArtifactSink) -> Result<RunSummary> {
        let catalog = self.extract_pages(pages, sink)?;
        let report = self.analyzer.analyze(&catalog);
        let merge = CatalogStore::new(&self.paths.catalog).merge(&catalog, Some(&report))?;

        let summary = RunSummary {
            pages: pages.len() as u32,
            symbols: catalog.len(),
            symbols_with_descriptors: catalog
                .symbols()
                .iter()
                .filter(|s| !s.descriptors.is_empty())
                .count(),
            report,
            merge,
        };
        info!("Processing finished");
        Ok(summary)
    }

    /// Rasterize and process every page, in order, into a frozen catalog
    pub fn extract(&self, rasterizer: &dyn Rasterizer, sink: &dyn ArtifactSink) -> Result<(u32, Catalog)> {
        let pages = self.rasterize(rasterizer)?;
        let catalog = self.extract_pages(&pages, sink)?;
        Ok((pages.len() as u32, catalog))
    }

    /// Render the whole document up front so a failing page aborts the run
    /// before any artifact exists
    fn rasterize(&self, rasterizer: &dyn Rasterizer) -> Result<Vec<Page>> {
        let pages = rasterize_all(rasterizer, &self.paths.document)?;
        info!("Rendered {} pages", pages.len());
        Ok(pages)
    }

    fn extract_pages(&self, pages: &[Page], sink: &dyn ArtifactSink) -> Result<Catalog> {
        let mut builder = CatalogBuilder::new();
        for page in pages {
            let page_path = sink.save_page(page.number, &page.image)?;
            info!("Page {} saved: {}", page.number, page_path.display());
            self.process_page(page, sink, &mut builder)?;
        }
        Ok(builder.finish())
    }

    /// Detect, crop, describe and record the symbols of one page.
    /// Returns how many symbols were added.
    pub fn process_page(
        &self,
        page: &Page,
        sink: &dyn ArtifactSink,
        builder: &mut CatalogBuilder,
    ) -> Result<usize> {
        info!("Extracting symbols from page {}", page.number);
        let detected = self.detector.detect(page.number, &page.image)?;

        builder.begin_page(page.number);
        let mut added = 0;
        if let Some(enhanced) = &detected.enhanced {
            for bbox in &detected.regions {
                let color = page.image.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
                let gray = imageops::crop_imm(enhanced, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
                let descriptors = self.descriptors.extract(&gray);

                let path = sink.save_symbol(&builder.next_id(), &color)?;
                builder.push(path, *bbox, descriptors);
                added += 1;
            }
        }

        info!("Extracted {} symbols from page {}", added, page.number);
        Ok(added)
    }
}
