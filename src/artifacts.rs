//! Where page rasters and symbol crops are written.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::models::SymbolId;

pub trait ArtifactSink {
    /// Store a page raster, returning where it went
    fn save_page(&self, page: u32, image: &DynamicImage) -> Result<PathBuf>;

    /// Store the color crop of a symbol, returning where it went
    fn save_symbol(&self, id: &SymbolId, image: &DynamicImage) -> Result<PathBuf>;
}

pub fn page_file_name(page: u32) -> String {
    format!("page_{}.png", page)
}

pub fn symbol_file_name(id: &SymbolId) -> String {
    format!("symbol_{}.png", id)
}

/// Writes PNG files into one output directory
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    /// Creates the directory when it does not exist yet
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| Error::ArtifactWrite {
            path: output_dir.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write(&self, file_name: String, image: &DynamicImage) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| Error::ArtifactWrite {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }
}

impl ArtifactSink for DirectorySink {
    fn save_page(&self, page: u32, image: &DynamicImage) -> Result<PathBuf> {
        self.write(page_file_name(page), image)
    }

    fn save_symbol(&self, id: &SymbolId, image: &DynamicImage) -> Result<PathBuf> {
        self.write(symbol_file_name(id), image)
    }
}

/// Keeps artifacts in memory under the paths a DirectorySink would use
#[derive(Default)]
pub struct MemorySink {
    root: PathBuf,
    saved: RefCell<Vec<(PathBuf, DynamicImage)>>,
}

impl MemorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            saved: RefCell::new(Vec::new()),
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.saved.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn get(&self, path: &Path) -> Option<DynamicImage> {
        self.saved
            .borrow()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, img)| img.clone())
    }

    fn keep(&self, file_name: String, image: &DynamicImage) -> PathBuf {
        let path = self.root.join(file_name);
        self.saved.borrow_mut().push((path.clone(), image.clone()));
        path
    }
}

impl ArtifactSink for MemorySink {
    fn save_page(&self, page: u32, image: &DynamicImage) -> Result<PathBuf> {
        Ok(self.keep(page_file_name(page), image))
    }

    fn save_symbol(&self, id: &SymbolId, image: &DynamicImage) -> Result<PathBuf> {
        Ok(self.keep(symbol_file_name(id), image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(page_file_name(3), "page_3.png");
        assert_eq!(symbol_file_name(&SymbolId::new(2, 14)), "symbol_p2_s14.png");
    }

    #[test]
    fn directory_sink_creates_dir_and_writes_png() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("out").join("nested")).unwrap();
        let path = sink
            .save_symbol(&SymbolId::new(1, 1), &DynamicImage::new_rgb8(5, 7))
            .unwrap();
        assert!(path.ends_with("symbol_p1_s1.png"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (5, 7));
    }

    #[test]
    fn output_dir_that_is_a_file_is_artifact_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("symbols");
        std::fs::write(&blocker, b"x").unwrap();

        let err = DirectorySink::new(&blocker).err().unwrap();
        assert!(matches!(err, Error::ArtifactWrite { path, .. } if path == blocker));
    }

    #[test]
    fn unwritable_symbol_is_artifact_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("out")).unwrap();
        // a directory where the crop should go
        std::fs::create_dir(sink.output_dir().join("symbol_p1_s1.png")).unwrap();

        let err = sink
            .save_symbol(&SymbolId::new(1, 1), &DynamicImage::new_rgb8(3, 3))
            .err()
            .unwrap();
        assert!(matches!(err, Error::ArtifactWrite { .. }));
    }
}
