//! Visual-similarity grouping of the symbols of one run.
//!
//! Every descriptor of every symbol goes into one pool, is projected with PCA
//! and clustered with k-means; each symbol then takes the label most of its
//! descriptors received.

pub mod kmeans;
pub mod pca;
pub mod stats;

use std::collections::BTreeMap;

use ndarray::Array2;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::error::Result;
use crate::models::{Catalog, ClusterLabel, DESCRIPTOR_BYTES};

pub use kmeans::{KMeans, KMeansFit};
pub use pca::Pca;
pub use stats::SizeStats;

/// What the clustering stage did
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutcome {
    /// No symbol had any descriptor; clustering was skipped
    NoDescriptors,
    Clustered {
        descriptors: usize,
        components: usize,
        /// Share of descriptor variance kept by the PCA projection
        explained_variance: f64,
        clusters: usize,
        inertia: f64,
    },
}

/// Derived labels and statistics for a catalog. Labels are indexed like
/// `Catalog::symbols()`.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub outcome: ClusterOutcome,
    pub labels: Vec<Option<ClusterLabel>>,
    /// Symbols per assigned label
    pub frequency: BTreeMap<ClusterLabel, usize>,
    /// Bounding-box size statistics over all symbols; None for an empty catalog
    pub sizes: Option<SizeStats>,
}

impl AnalysisReport {
    pub fn label_of(&self, index: usize) -> Option<ClusterLabel> {
        self.labels.get(index).copied().flatten()
    }
}

pub struct ClusterAnalyzer {
    config: ClusterConfig,
}

impl ClusterAnalyzer {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn analyze(&self, catalog: &Catalog) -> AnalysisReport {
        info!("Analyzing {} extracted symbols", catalog.len());

        let (outcome, labels) = self.cluster(catalog);

        let frequency = cluster_frequency(&labels);
        if let ClusterOutcome::Clustered { .. } = outcome {
            info!("Symbol cluster frequency:");
            for (label, count) in &frequency {
                info!("Cluster {}: {} symbols", label, count);
            }
        }

        let sizes = SizeStats::from_sizes(catalog.symbols().iter().map(|s| s.position.area()));
        match &sizes {
            Some(stats) => {
                info!("Symbol statistics:");
                info!("Total symbols: {}", stats.count);
                info!("Mean symbol size: {:.2} pixels", stats.mean);
                info!("Min symbol size: {} pixels", stats.min);
                info!("Max symbol size: {} pixels", stats.max);
            }
            None => info!("No symbols extracted for analysis"),
        }

        AnalysisReport {
            outcome,
            labels,
            frequency,
            sizes,
        }
    }

    fn cluster(&self, catalog: &Catalog) -> (ClusterOutcome, Vec<Option<ClusterLabel>>) {
        let n_descriptors = catalog.descriptor_count();
        if n_descriptors == 0 {
            info!("No descriptors extracted for analysis");
            return (ClusterOutcome::NoDescriptors, vec![None; catalog.len()]);
        }

        // Pool rows are laid out symbol by symbol, so each symbol owns a
        // contiguous run of rows
        let mut pool = Array2::<f64>::zeros((n_descriptors, DESCRIPTOR_BYTES));
        let mut row = 0;
        for symbol in catalog.symbols() {
            for descriptor in &symbol.descriptors {
                for (col, byte) in descriptor.bytes().iter().enumerate() {
                    pool[[row, col]] = *byte as f64;
                }
                row += 1;
            }
        }

        let components = self.config.pca_components.min(n_descriptors).min(DESCRIPTOR_BYTES);
        if components < self.config.pca_components {
            warn!(
                "Reducing PCA components from {} to {} ({} descriptors of {} dimensions)",
                self.config.pca_components, components, n_descriptors, DESCRIPTOR_BYTES
            );
        }
        let (pca, reduced) = Pca::fit_transform(&pool, components);
        let explained_variance = pca.explained_variance_ratio();
        info!(
            "PCA kept {} components explaining {:.1}% of descriptor variance",
            pca.n_components(),
            explained_variance * 100.0
        );

        let clusters = self.config.num_clusters.min(n_descriptors);
        if clusters < self.config.num_clusters {
            warn!(
                "Reducing cluster count from {} to {} ({} descriptors)",
                self.config.num_clusters, clusters, n_descriptors
            );
        }
        let fit = KMeans {
            n_clusters: clusters,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            tol: self.config.tol,
            seed: self.config.random_seed,
        }
        .fit(&reduced);

        let mut labels = Vec::with_capacity(catalog.len());
        let mut start = 0;
        for symbol in catalog.symbols() {
            let end = start + symbol.descriptors.len();
            labels.push(majority_label(&fit.labels[start..end], clusters));
            start = end;
        }

        let outcome = ClusterOutcome::Clustered {
            descriptors: n_descriptors,
            components,
            explained_variance,
            clusters,
            inertia: fit.inertia,
        };
        (outcome, labels)
    }
}

/// Most frequent label among a symbol's descriptors; ties go to the lowest label
pub fn majority_label(descriptor_labels: &[usize], n_clusters: usize) -> Option<ClusterLabel> {
    if descriptor_labels.is_empty() {
        return None;
    }
    let mut tally = vec![0usize; n_clusters.max(1)];
    for &label in descriptor_labels {
        if label >= tally.len() {
            tally.resize(label + 1, 0);
        }
        tally[label] += 1;
    }

    let mut best = 0;
    for (label, &count) in tally.iter().enumerate() {
        if count > tally[best] {
            best = label;
        }
    }
    Some(ClusterLabel(best as u32))
}

/// Number of symbols per assigned label
pub fn cluster_frequency(labels: &[Option<ClusterLabel>]) -> BTreeMap<ClusterLabel, usize> {
    let mut frequency = BTreeMap::new();
    for label in labels.iter().flatten() {
        *frequency.entry(*label).or_insert(0) += 1;
    }
    frequency
}
