#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from glyphsift for tests
pub use glyphsift::config::{AreaMeasure, ClusterConfig, DetectorConfig, PipelineConfig, RegionOrder};
pub use glyphsift::models::{BoundingBox, Catalog, CatalogBuilder, ClusterLabel, Descriptor, Symbol, SymbolId};
pub use glyphsift::{
    AnalysisReport, CatalogStore, ClusterAnalyzer, ClusterOutcome, Error, PersistedCatalog, RegionDetector, RunPaths,
    SymbolExtractor, SymbolRecord,
};

/// Descriptor with every byte set to `fill`, except the first which carries `jitter`
pub fn descriptor(fill: u8, jitter: u8) -> Descriptor {
    let mut bytes = [fill; 32];
    bytes[0] = fill ^ jitter;
    Descriptor(bytes)
}

/// Symbol on `page` with a `side` x `side` box
pub fn make_symbol(page: u32, seq: u32, side: u32, descriptors: Vec<Descriptor>) -> Symbol {
    Symbol {
        page,
        symbol_id: SymbolId::new(page, seq),
        path: format!("symbol_p{}_s{}.png", page, seq).into(),
        position: BoundingBox {
            x: seq * 40,
            y: 10,
            width: side,
            height: side,
        },
        descriptors,
    }
}

pub fn cluster_config(num_clusters: usize, pca_components: usize, seed: u64) -> ClusterConfig {
    ClusterConfig {
        num_clusters,
        pca_components,
        random_seed: seed,
        ..ClusterConfig::default()
    }
}
