use std::path::{Path, PathBuf};

use glyphsift::raster::{Page, Rasterizer};
use glyphsift::{BoundingBox, Error, Result, RunPaths};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

pub const INK: Rgb<u8> = Rgb([0, 0, 0]);
pub const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

pub fn blank_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, PAPER)
}

pub fn fill(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(width, height), INK);
}

/// Plus sign occupying a `size` x `size` box
pub fn draw_plus(img: &mut RgbImage, x: i32, y: i32, size: u32, stroke: u32) {
    let offset = ((size - stroke) / 2) as i32;
    fill(img, x + offset, y, stroke, size);
    fill(img, x, y + offset, size, stroke);
}

/// L shape: vertical stroke on the left, horizontal stroke along the bottom
pub fn draw_ell(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, stroke: u32) {
    fill(img, x, y, stroke, height);
    fill(img, x, y + (height - stroke) as i32, width, stroke);
}

/// Hollow rectangle
pub fn draw_frame(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, stroke: u32) {
    fill(img, x, y, width, stroke);
    fill(img, x, y + (height - stroke) as i32, width, stroke);
    fill(img, x, y, stroke, height);
    fill(img, x + (width - stroke) as i32, y, stroke, height);
}

/// Where the glyphs of `mixed_page` are drawn
pub const PLUS_BOX: BoundingBox = BoundingBox { x: 20, y: 20, width: 30, height: 30 };
pub const ELL_BOX: BoundingBox = BoundingBox { x: 80, y: 20, width: 16, height: 28 };
pub const BLOCK_BOX: BoundingBox = BoundingBox { x: 140, y: 30, width: 12, height: 12 };

/// A page with three symbol-sized glyphs and several things the region
/// filter must reject: a sliver, an oversized frame, a tiny dot and a
/// single-pixel speck.
pub fn mixed_page() -> DynamicImage {
    let mut img = blank_page(320, 240);

    draw_plus(&mut img, PLUS_BOX.x as i32, PLUS_BOX.y as i32, PLUS_BOX.width, 6);
    draw_ell(&mut img, ELL_BOX.x as i32, ELL_BOX.y as i32, ELL_BOX.width, ELL_BOX.height, 5);
    fill(&mut img, BLOCK_BOX.x as i32, BLOCK_BOX.y as i32, BLOCK_BOX.width, BLOCK_BOX.height);

    // aspect ratio 37.5
    fill(&mut img, 20, 120, 150, 4);
    // area 8800
    draw_frame(&mut img, 190, 130, 110, 80, 4);
    // area 25
    fill(&mut img, 250, 40, 5, 5);
    img.put_pixel(300, 20, INK);

    DynamicImage::ImageRgb8(img)
}

pub const FRAME_BOX: BoundingBox = BoundingBox { x: 20, y: 30, width: 40, height: 40 };
pub const HOOK_BOX: BoundingBox = BoundingBox { x: 110, y: 30, width: 40, height: 40 };

/// Two glyphs with the same 40x40 bounding box: a hollow square, whose outer
/// contour encloses about 1500 pixels, and a thin L enclosing about 225
pub fn outline_page() -> DynamicImage {
    let mut img = blank_page(200, 120);
    draw_frame(&mut img, FRAME_BOX.x as i32, FRAME_BOX.y as i32, FRAME_BOX.width, FRAME_BOX.height, 4);
    draw_ell(&mut img, HOOK_BOX.x as i32, HOOK_BOX.y as i32, HOOK_BOX.width, HOOK_BOX.height, 4);
    DynamicImage::ImageRgb8(img)
}

/// A page holding a single plus sign
pub fn plus_page() -> DynamicImage {
    let mut img = blank_page(160, 120);
    draw_plus(&mut img, 60, 40, 30, 6);
    DynamicImage::ImageRgb8(img)
}

/// A page holding one solid block too small to carry any keypoint
pub fn block_page() -> DynamicImage {
    let mut img = blank_page(120, 90);
    fill(&mut img, 50, 40, 12, 12);
    DynamicImage::ImageRgb8(img)
}

pub fn white_page() -> DynamicImage {
    DynamicImage::ImageRgb8(blank_page(120, 90))
}

/// Rasterizer over pages already in memory; the document path is ignored
pub struct MemoryRasterizer {
    pub pages: Vec<DynamicImage>,
}

impl MemoryRasterizer {
    pub fn new(pages: Vec<DynamicImage>) -> Self {
        Self { pages }
    }
}

impl Rasterizer for MemoryRasterizer {
    fn rasterize(&self, path: &Path, visit: &mut dyn FnMut(Page) -> Result<()>) -> Result<u32> {
        if self.pages.is_empty() {
            return Err(Error::SourceRead {
                path: path.to_path_buf(),
                reason: "document has no pages".to_string(),
            });
        }
        for (i, image) in self.pages.iter().enumerate() {
            visit(Page {
                number: (i + 1) as u32,
                image: image.clone(),
            })?;
        }
        Ok(self.pages.len() as u32)
    }
}

/// Renders `pages` and then fails on the page after them, like a PDF with a
/// corrupt page in the middle
pub struct BrokenPageRasterizer {
    pub pages: Vec<DynamicImage>,
}

impl Rasterizer for BrokenPageRasterizer {
    fn rasterize(&self, path: &Path, visit: &mut dyn FnMut(Page) -> Result<()>) -> Result<u32> {
        for (i, image) in self.pages.iter().enumerate() {
            visit(Page {
                number: (i + 1) as u32,
                image: image.clone(),
            })?;
        }
        Err(Error::SourceRead {
            path: path.to_path_buf(),
            reason: format!("failed to render page {}", self.pages.len() + 1),
        })
    }
}

/// Run paths inside a temp directory. The document path does not need to exist
/// when a MemoryRasterizer is used.
pub fn run_paths(dir: &Path) -> RunPaths {
    RunPaths {
        document: dir.join("document.pdf"),
        output_dir: dir.join("symbols"),
        catalog: dir.join("catalog.json"),
    }
}

/// Save an image as PNG inside `dir`
pub fn save_png(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// True when every edge of `actual` is within `slack` pixels of `expected`
pub fn roughly(actual: &BoundingBox, expected: &BoundingBox, slack: u32) -> bool {
    actual.x.abs_diff(expected.x) <= slack
        && actual.y.abs_diff(expected.y) <= slack
        && actual.width.abs_diff(expected.width) <= slack
        && actual.height.abs_diff(expected.height) <= slack
}
