use std::fmt;
use std::path::PathBuf;

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Bytes per binary descriptor (256 BRIEF tests).
pub const DESCRIPTOR_BYTES: usize = 32;

/// Axis-aligned bounding box in page pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Clamp to an image of the given size. Returns None when nothing is left.
    pub fn clamp_to(&self, img_width: u32, img_height: u32) -> Option<BoundingBox> {
        if self.x >= img_width || self.y >= img_height {
            return None;
        }
        let width = self.width.min(img_width - self.x);
        let height = self.height.min(img_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(BoundingBox { x: self.x, y: self.y, width, height })
    }
}

/// Outer boundary of a foreground blob as traced on the binary mask
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Inclusive extent of the traced points
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if min_x < 0 || min_y < 0 {
            return None;
        }
        Some(BoundingBox {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    /// Polygon area enclosed by the contour (shoelace formula).
    /// A one-pixel-thick trace encloses nothing, so its area is 0.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice_area = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice_area as f64 / 2.0).abs()
    }
}

/// Identifier of a symbol within one run: `p<page>_s<seq>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn new(page: u32, sequence: u32) -> Self {
        Self(format!("p{}_s{}", page, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One binary keypoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u8; DESCRIPTOR_BYTES]);

impl Descriptor {
    pub fn bytes(&self) -> &[u8; DESCRIPTOR_BYTES] {
        &self.0
    }
}

/// Cluster index assigned by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterLabel(pub u32);

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One detected symbol region
#[derive(Debug, Clone)]
pub struct Symbol {
    pub page: u32,
    pub symbol_id: SymbolId,
    /// Where the color crop artifact was written
    pub path: PathBuf,
    pub position: BoundingBox,
    pub descriptors: Vec<Descriptor>,
}

/// Append-only accumulator for the symbols of one run
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    symbols: Vec<Symbol>,
    current_page: u32,
    next_sequence: u32,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering symbols for a new page
    pub fn begin_page(&mut self, page: u32) {
        self.current_page = page;
        self.next_sequence = 1;
    }

    /// Id the next pushed symbol will receive
    pub fn next_id(&self) -> SymbolId {
        SymbolId::new(self.current_page, self.next_sequence)
    }

    pub fn push(&mut self, path: PathBuf, position: BoundingBox, descriptors: Vec<Descriptor>) -> &Symbol {
        let symbol = Symbol {
            page: self.current_page,
            symbol_id: self.next_id(),
            path,
            position,
            descriptors,
        };
        self.next_sequence += 1;
        self.symbols.push(symbol);
        &self.symbols[self.symbols.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn finish(self) -> Catalog {
        Catalog { symbols: self.symbols }
    }
}

/// Frozen catalog of a finished run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    symbols: Vec<Symbol>,
}

impl Catalog {
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn descriptor_count(&self) -> usize {
        self.symbols.iter().map(|s| s.descriptors.len()).sum()
    }
}

impl From<Vec<Symbol>> for Catalog {
    fn from(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }
}
