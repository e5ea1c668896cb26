use std::path::PathBuf;

/// Failures surfaced by the extraction run. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read source document {}: {reason}", path.display())]
    SourceRead { path: PathBuf, reason: String },

    #[error("region detection failed on page {page} during {stage}: {reason}")]
    RegionDetection {
        page: u32,
        stage: String,
        reason: String,
    },

    #[error("cannot write artifact {}: {reason}", path.display())]
    ArtifactWrite { path: PathBuf, reason: String },

    #[error("cannot read catalog {}: {reason}", path.display())]
    StoreRead { path: PathBuf, reason: String },

    #[error("cannot write catalog {}: {reason}", path.display())]
    StoreWrite { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
