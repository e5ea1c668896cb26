use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::separable_filter_equal;
use imageproc::morphology;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid x grid` mesh of tiles. Each tile gets its
/// own equalization curve, with histogram bins clipped at
/// `clip_limit * tile_area / 256` and the excess spread evenly over all bins.
/// Output pixels blend the curves of the four nearest tile centres.
pub fn equalize_local(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(grid.clamp(1, width));
    let tile_h = height.div_ceil(grid.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(clipped_equalization(&mut hist, area, clip_limit));
        }
    }

    // Tile index to the left/top of a coordinate, plus blend weight
    let neighbours = |coord: u32, tile: u32, count: u32| -> (usize, usize, f32) {
        let f = (coord as f32 + 0.5) / tile as f32 - 0.5;
        let lower = f.floor();
        let weight = f - lower;
        let lower = lower as i64;
        let a = lower.clamp(0, count as i64 - 1) as usize;
        let b = (lower + 1).clamp(0, count as i64 - 1) as usize;
        (a, b, weight)
    };

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = neighbours(x, tile_w, tiles_x);
            let v = img.get_pixel(x, y)[0] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x as usize + tx][v] as f32;

            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
            let value = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn clipped_equalization(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge
fn reflect101(mut i: i64, n: i64) -> i64 {
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * (n - 1) - i;
        } else {
            return i;
        }
    }
}

/// Non-local means denoising.
///
/// Every pixel becomes a weighted mean of the pixels in its search window.
/// The weight of a candidate is `exp(-d / h²)`, where `d` is the mean squared
/// difference between the template patches around the two pixels. Patch
/// distances are computed per search offset with an integral image, so the
/// cost does not grow with the template size.
pub fn denoise_nl_means(img: &GrayImage, h: f32, template_window: u32, search_window: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || h <= 0.0 {
        return img.clone();
    }

    let tr = (template_window / 2) as i64;
    let sr = (search_window / 2) as i64;
    let pad = tr + sr;
    let (w, hgt) = (width as i64, height as i64);
    let pw = w + 2 * pad;
    let ph = hgt + 2 * pad;

    let mut padded = vec![0i32; (pw * ph) as usize];
    for py in 0..ph {
        let sy = reflect101(py - pad, hgt) as u32;
        for px in 0..pw {
            let sx = reflect101(px - pad, w) as u32;
            padded[(py * pw + px) as usize] = img.get_pixel(sx, sy)[0] as i32;
        }
    }

    // Domain of squared differences: every template window of every pixel
    let dw = w + 2 * tr;
    let dh = hgt + 2 * tr;
    let iw = dw + 1;
    let mut integral = vec![0u64; (iw * (dh + 1)) as usize];

    let pixel_count = (w * hgt) as usize;
    let mut weight_sum = vec![0f64; pixel_count];
    let mut value_sum = vec![0f64; pixel_count];

    let template_area = ((2 * tr + 1) * (2 * tr + 1)) as f64;
    let inv_h2 = 1.0 / (h as f64 * h as f64);

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            for y in 0..dh {
                let py = y + pad - tr;
                let mut row = 0u64;
                for x in 0..dw {
                    let px = x + pad - tr;
                    let a = padded[(py * pw + px) as usize];
                    let b = padded[((py + dy) * pw + px + dx) as usize];
                    let d = (a - b) as i64;
                    row += (d * d) as u64;
                    integral[((y + 1) * iw + x + 1) as usize] = integral[(y * iw + x + 1) as usize] + row;
                }
            }

            for y in 0..hgt {
                let (y0, y1) = (y, y + 2 * tr + 1);
                for x in 0..w {
                    let (x0, x1) = (x, x + 2 * tr + 1);
                    let ssd = integral[(y1 * iw + x1) as usize] + integral[(y0 * iw + x0) as usize]
                        - integral[(y0 * iw + x1) as usize]
                        - integral[(y1 * iw + x0) as usize];
                    let weight = (-(ssd as f64 / template_area) * inv_h2).exp();

                    let idx = (y * w + x) as usize;
                    let candidate = padded[((y + pad + dy) * pw + x + pad + dx) as usize];
                    weight_sum[idx] += weight;
                    value_sum[idx] += weight * candidate as f64;
                }
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let idx = (y as usize) * width as usize + x as usize;
        // The zero offset always contributes weight 1, so the sum is never 0
        let value = value_sum[idx] / weight_sum[idx];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Sampled Gaussian kernel of odd length `size`, normalized to sum 1
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes foreground (255) when it is at least `c` darker than the
/// weighted mean of its `block_size x block_size` neighbourhood.
pub fn adaptive_threshold_gaussian(img: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let kernel = gaussian_kernel(block_size);
    let local_mean = separable_filter_equal(img, &kernel);

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0] as f32;
        let mean = local_mean.get_pixel(x, y)[0] as f32;
        if v <= mean - c { Luma([255u8]) } else { Luma([0u8]) }
    })
}

/// Morphological opening with a square structuring element
pub fn open(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morphology::open(mask, Norm::LInf, square_radius(kernel_size))
}

/// Morphological closing with a square structuring element
pub fn close(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morphology::close(mask, Norm::LInf, square_radius(kernel_size))
}

/// A `(2k+1)`-wide square is the L∞ ball of radius k
fn square_radius(kernel_size: u32) -> u8 {
    (kernel_size / 2).min(u8::MAX as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_indices() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(7, 3), 1);
        assert_eq!(reflect101(4, 1), 0);
    }

    #[test]
    fn clahe_keeps_flat_image_flat() {
        let img = GrayImage::from_pixel(40, 32, Luma([128u8]));
        let out = equalize_local(&img, 2.0, 8);
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn clahe_stretches_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([if x < 32 { 100u8 } else { 110u8 }]));
        let out = equalize_local(&img, 4.0, 1);
        let left = out.get_pixel(5, 32)[0] as i32;
        let right = out.get_pixel(58, 32)[0] as i32;
        assert!(right - left > 10, "left={left} right={right}");
    }

    #[test]
    fn nl_means_removes_isolated_speck() {
        let mut img = GrayImage::from_pixel(24, 24, Luma([200u8]));
        img.put_pixel(12, 12, Luma([0u8]));
        let out = denoise_nl_means(&img, 60.0, 3, 7);
        assert!(out.get_pixel(12, 12)[0] > 100);
        assert_eq!(out.get_pixel(2, 2)[0], 200);
    }

    #[test]
    fn nl_means_with_zero_strength_is_identity() {
        let img = GrayImage::from_fn(9, 9, |x, y| Luma([(x * 20 + y) as u8]));
        assert_eq!(denoise_nl_means(&img, 0.0, 7, 21), img);
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        let k = gaussian_kernel(15);
        assert_eq!(k.len(), 15);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[7] > k[0]);
    }

    #[test]
    fn threshold_marks_dark_ink() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([220u8]));
        for y in 10..20 {
            for x in 14..16 {
                img.put_pixel(x, y, Luma([20u8]));
            }
        }
        let mask = adaptive_threshold_gaussian(&img, 15, 10.0);
        assert_eq!(mask.get_pixel(14, 15)[0], 255);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn opening_drops_specks_closing_fills_gaps() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(2, 2, Luma([255u8]));
        for y in 8..16 {
            for x in 8..16 {
                if x != 12 {
                    mask.put_pixel(x, y, Luma([255u8]));
                }
            }
        }
        let cleaned = close(&open(&mask, 3), 3);
        assert_eq!(cleaned.get_pixel(2, 2)[0], 0);
        assert_eq!(cleaned.get_pixel(12, 12)[0], 255);
    }
}
