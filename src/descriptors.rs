//! Binary keypoint descriptors for symbol crops.
//!
//! ORB-style: FAST-9 corners, intensity-centroid orientation and a steered
//! BRIEF test over a smoothed patch. Each keypoint yields 256 bits.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;

use crate::config::DescriptorConfig;
use crate::error::Result;
use crate::models::{Descriptor, DESCRIPTOR_BYTES};

const DESCRIPTOR_BITS: usize = DESCRIPTOR_BYTES * 8;

/// Fixed so every run samples the same test pattern
const PATTERN_SEED: u64 = 0x2f6b_1c43_9d0a_e571;

const SMOOTHING_SIGMA: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub score: f32,
    /// Patch orientation in radians
    pub angle: f32,
}

/// Offsets of one intensity comparison, relative to the keypoint
#[derive(Debug, Clone, Copy)]
struct TestPair {
    a: (f32, f32),
    b: (f32, f32),
}

pub struct DescriptorExtractor {
    config: DescriptorConfig,
    radius: u32,
    pattern: Vec<TestPair>,
}

impl DescriptorExtractor {
    pub fn new(config: DescriptorConfig) -> Result<Self> {
        config.validate()?;
        let radius = config.patch_size / 2;
        let pattern = sample_pattern(radius as f32);
        Ok(Self { config, radius, pattern })
    }

    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    /// Descriptors for every retained keypoint of a grayscale crop.
    /// Featureless or too-small crops give an empty result.
    pub fn extract(&self, gray: &GrayImage) -> Vec<Descriptor> {
        self.detect_and_compute(gray).into_iter().map(|(_, d)| d).collect()
    }

    pub fn detect_and_compute(&self, gray: &GrayImage) -> Vec<(Keypoint, Descriptor)> {
        let keypoints = self.detect_keypoints(gray);
        if keypoints.is_empty() {
            return Vec::new();
        }

        let smoothed = gaussian_blur_f32(gray, SMOOTHING_SIGMA);
        keypoints
            .into_iter()
            .map(|kp| {
                let descriptor = self.describe(&smoothed, &kp);
                (kp, descriptor)
            })
            .collect()
    }

    /// FAST-9 corners far enough from the border for a full patch,
    /// non-maximum suppressed, strongest first
    pub fn detect_keypoints(&self, gray: &GrayImage) -> Vec<Keypoint> {
        let (width, height) = gray.dimensions();
        let r = self.radius;
        if width <= 2 * r || height <= 2 * r {
            return Vec::new();
        }

        let corners: Vec<_> = corners_fast9(gray, self.config.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= r && c.y >= r && c.x < width - r && c.y < height - r)
            .collect();

        let mut scores = vec![0f32; (width * height) as usize];
        for c in &corners {
            scores[(c.y * width + c.x) as usize] = c.score;
        }
        let score_at = |x: i64, y: i64| -> f32 {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                0.0
            } else {
                scores[(y as u32 * width + x as u32) as usize]
            }
        };

        let mut keypoints: Vec<Keypoint> = corners
            .iter()
            .filter(|c| {
                let (cx, cy) = (c.x as i64, c.y as i64);
                (-1..=1).all(|dy| {
                    (-1..=1).all(|dx| (dx == 0 && dy == 0) || score_at(cx + dx, cy + dy) <= c.score)
                })
            })
            .map(|c| Keypoint {
                x: c.x,
                y: c.y,
                score: c.score,
                angle: intensity_centroid_angle(gray, c.x, c.y, r),
            })
            .collect();

        keypoints.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });
        keypoints.truncate(self.config.max_keypoints);
        keypoints
    }

    fn describe(&self, smoothed: &GrayImage, kp: &Keypoint) -> Descriptor {
        let (sin, cos) = kp.angle.sin_cos();
        let sample = |(ox, oy): (f32, f32)| -> u8 {
            let rx = (ox * cos - oy * sin).round() as i64;
            let ry = (ox * sin + oy * cos).round() as i64;
            let x = (kp.x as i64 + rx) as u32;
            let y = (kp.y as i64 + ry) as u32;
            smoothed.get_pixel(x, y)[0]
        };

        let mut bytes = [0u8; DESCRIPTOR_BYTES];
        for (bit, pair) in self.pattern.iter().enumerate() {
            if sample(pair.a) < sample(pair.b) {
                bytes[bit / 8] |= 1 << (bit % 8);
            }
        }
        Descriptor(bytes)
    }
}

/// Orientation from the first-order moments of a disc around the keypoint
fn intensity_centroid_angle(gray: &GrayImage, x: u32, y: u32, radius: u32) -> f32 {
    let r = radius as i64;
    let (mut m10, mut m01) = (0f64, 0f64);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let v = gray.get_pixel((x as i64 + dx) as u32, (y as i64 + dy) as u32)[0] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10) as f32
}

/// Test offsets drawn from an isotropic Gaussian (sigma = patch / 5) inside
/// the patch disc, so any rotation of them stays inside the patch
fn sample_pattern(radius: f32) -> Vec<TestPair> {
    let mut rng = fastrand::Rng::with_seed(PATTERN_SEED);
    let sigma = (2.0 * radius + 1.0) / 5.0;

    let mut point = || loop {
        // Box-Muller
        let u1 = rng.f32().max(f32::MIN_POSITIVE);
        let u2 = rng.f32();
        let mag = sigma * (-2.0 * u1.ln()).sqrt();
        let angle = std::f32::consts::TAU * u2;
        let (px, py) = (mag * angle.cos(), mag * angle.sin());
        if px * px + py * py <= radius * radius {
            return (px, py);
        }
    };

    (0..DESCRIPTOR_BITS)
        .map(|_| TestPair { a: point(), b: point() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn extractor() -> DescriptorExtractor {
        DescriptorExtractor::new(DescriptorConfig::default()).unwrap()
    }

    fn dark_square(size: u32, side: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, Luma([230u8]));
        let offset = ((size - side) / 2) as i32;
        draw_filled_rect_mut(&mut img, Rect::at(offset, offset).of_size(side, side), Luma([20u8]));
        img
    }

    #[test]
    fn blank_crop_has_no_descriptors() {
        let img = GrayImage::from_pixel(40, 40, Luma([255u8]));
        assert!(extractor().extract(&img).is_empty());
    }

    #[test]
    fn tiny_crop_has_no_descriptors() {
        assert!(extractor().extract(&dark_square(12, 4)).is_empty());
    }

    #[test]
    fn square_corners_are_keypoints() {
        let ex = extractor();
        let img = dark_square(40, 12);
        let keypoints = ex.detect_keypoints(&img);
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.x >= 7 && kp.x < 33 && kp.y >= 7 && kp.y < 33);
        }
        assert!(keypoints.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ex.extract(&img).len(), keypoints.len());
    }

    #[test]
    fn identical_crops_give_identical_descriptors() {
        let ex = extractor();
        let a = ex.extract(&dark_square(40, 12));
        let b = ex.extract(&dark_square(40, 12));
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn keypoint_cap_is_respected() {
        let ex = DescriptorExtractor::new(DescriptorConfig {
            max_keypoints: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(ex.extract(&dark_square(40, 12)).len() <= 2);
    }

    #[test]
    fn pattern_is_stable_and_inside_patch() {
        let p1 = sample_pattern(7.0);
        let p2 = sample_pattern(7.0);
        assert_eq!(p1.len(), 256);
        for (x, y) in p1.iter().flat_map(|p| [p.a, p.b]) {
            assert!(x * x + y * y <= 49.0);
        }
        assert!(p1.iter().zip(&p2).all(|(a, b)| a.a == b.a && a.b == b.b));
    }
}
