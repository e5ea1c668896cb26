use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use glyphsift::config::{PipelineConfig, RegionOrder};
use glyphsift::{ClusterOutcome, DebugConfig, RunPaths, SymbolExtractor};

#[derive(Parser)]
#[command(name = "glyphsift")]
#[command(about = "Extract, describe and group symbols from scanned documents")]
struct Cli {
    /// Source document (PDF, or a single raster image)
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,

    /// Directory for page rasters and symbol crops
    #[arg(short, long, value_name = "DIR")]
    output_dir: PathBuf,

    /// JSON catalog the symbols are appended to
    #[arg(short, long, value_name = "FILE")]
    catalog: PathBuf,

    /// JSON file with pipeline parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed for cluster initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Number of symbol clusters
    #[arg(long)]
    clusters: Option<usize>,

    /// Dimensions kept after PCA
    #[arg(long)]
    pca_components: Option<usize>,

    /// Rasterization resolution for PDF pages
    #[arg(long)]
    dpi: Option<f32>,

    /// Number symbols top-to-bottom, left-to-right instead of discovery order
    #[arg(long)]
    reading_order: bool,

    /// Save per-step detection images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.cluster.random_seed = seed;
        }
        if let Some(clusters) = self.clusters {
            config.cluster.num_clusters = clusters;
        }
        if let Some(components) = self.pca_components {
            config.cluster.pca_components = components;
        }
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if self.reading_order {
            config.detector.region_order = RegionOrder::Reading;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = args.pipeline_config()?;
    let paths = RunPaths {
        document: args.document.clone(),
        output_dir: args.output_dir.clone(),
        catalog: args.catalog.clone(),
    };

    let debug = args
        .debug_out
        .clone()
        .map(DebugConfig::new)
        .transpose()
        .context("Cannot use debug output directory")?;

    let extractor = SymbolExtractor::new(paths, config)?.with_debug(debug);
    let summary = extractor
        .run()
        .with_context(|| format!("Failed to process {}", args.document.display()))?;

    println!("\n=== Symbol Extraction Results ===");
    println!("Pages processed: {}", summary.pages);
    println!("Symbols extracted: {}", summary.symbols);
    println!("Symbols with descriptors: {}", summary.symbols_with_descriptors);

    match summary.report.outcome {
        ClusterOutcome::NoDescriptors => println!("Clustering skipped: no descriptors"),
        ClusterOutcome::Clustered {
            descriptors,
            components,
            explained_variance,
            clusters,
            ..
        } => {
            println!(
                "Clustered {} descriptors ({} PCA components, {:.1}% variance) into {} clusters",
                descriptors,
                components,
                explained_variance * 100.0,
                clusters
            );
            if args.verbose {
                for (label, count) in &summary.report.frequency {
                    println!("  Cluster {}: {} symbols", label, count);
                }
            }
        }
    }

    if let Some(sizes) = summary.report.sizes {
        println!(
            "Symbol size: mean {:.2}, min {}, max {} pixels",
            sizes.mean, sizes.min, sizes.max
        );
    }

    println!(
        "Catalog {}: {} symbols ({} new)",
        args.catalog.display(),
        summary.merge.total(),
        summary.merge.appended
    );

    Ok(())
}
