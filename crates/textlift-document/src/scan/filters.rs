// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grayscale filter kernels used by the text enhancement pipeline: contrast
// limited adaptive histogram equalisation, bilateral smoothing, Gaussian
// adaptive thresholding and 2x2 binary morphology.
//
// All filters take a borrowed `GrayImage` and return a freshly allocated one.
// Out-of-image samples are clamped to the nearest edge pixel unless stated
// otherwise.

use image::{GrayImage, Luma};

const BINS: usize = 256;

// -- CLAHE --------------------------------------------------------------------

/// Contrast limited adaptive histogram equalisation.
///
/// The image is split into a `grid` x `grid` array of tiles. Each tile gets
/// an equalisation lookup table built from its clipped histogram, and every
/// pixel is mapped by bilinear interpolation between the four nearest tile
/// tables. Dimensions not divisible by `grid` are handled by replicating the
/// last row/column while building histograms.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(grid);
    let tile_h = height.div_ceil(grid);
    let tile_area = (tile_w * tile_h) as f32;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area / BINS as f32) as u32).max(1)
    } else {
        u32::MAX
    };
    let lut_scale = (BINS - 1) as f32 / tile_area;

    let mut luts = vec![[0u8; BINS]; (grid * grid) as usize];
    for ty in 0..grid {
        for tx in 0..grid {
            let mut hist = [0u32; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = y.min(height - 1);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = x.min(width - 1);
                    hist[gray.get_pixel(sx, sy).0[0] as usize] += 1;
                }
            }
            clip_histogram(&mut hist, clip);

            let lut = &mut luts[(ty * grid + tx) as usize];
            let mut sum = 0u32;
            for (bin, entry) in lut.iter_mut().enumerate() {
                sum += hist[bin];
                *entry = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let last = grid as i64 - 1;
    let inv_tile_w = 1.0 / tile_w as f32;
    let inv_tile_h = 1.0 / tile_h as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as usize;

        let tyf = y as f32 * inv_tile_h - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let (ty1, ty2) = (ty1.max(0) as u32, (ty1 + 1).min(last) as u32);

        let txf = x as f32 * inv_tile_w - 0.5;
        let tx1 = txf.floor() as i64;
        let xa = txf - tx1 as f32;
        let (tx1, tx2) = (tx1.max(0) as u32, (tx1 + 1).min(last) as u32);

        let at = |tx: u32, ty: u32| luts[(ty * grid + tx) as usize][value] as f32;
        let top = at(tx1, ty1) * (1.0 - xa) + at(tx2, ty1) * xa;
        let bottom = at(tx1, ty2) * (1.0 - xa) + at(tx2, ty2) * xa;
        let mapped = top * (1.0 - ya) + bottom * ya;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

/// Clip histogram bins at `clip` and spread the excess evenly over all bins.
///
/// Whatever does not divide evenly is handed out one count at a time at a
/// regular stride across the histogram.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess - batch * BINS as u32;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}

// -- Bilateral filter ---------------------------------------------------------

/// Edge-preserving bilateral smoothing.
///
/// `diameter` is the width of the circular neighbourhood. Each neighbour is
/// weighted by its spatial distance (`sigma_space`) and by its intensity
/// difference from the centre pixel (`sigma_color`), so flat regions are
/// smoothed while strong edges are left intact.
pub fn bilateral(gray: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let radius = (diameter / 2).max(1) as i64;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let color_weights: Vec<f32> = (0..BINS)
        .map(|delta| ((delta * delta) as f32 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist2 = dx * dx + dy * dy;
            if dist2 <= radius * radius {
                offsets.push((dx, dy, (dist2 as f32 * space_coeff).exp()));
            }
        }
    }

    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    GrayImage::from_fn(width, height, |x, y| {
        let centre = gray.get_pixel(x, y).0[0] as i32;
        let mut weighted = 0.0f32;
        let mut total = 0.0f32;

        for &(dx, dy, space_weight) in &offsets {
            let sx = (x as i64 + dx).clamp(0, max_x) as u32;
            let sy = (y as i64 + dy).clamp(0, max_y) as u32;
            let value = gray.get_pixel(sx, sy).0[0] as i32;
            let weight = space_weight * color_weights[(value - centre).unsigned_abs() as usize];
            weighted += weight * value as f32;
            total += weight;
        }

        Luma([(weighted / total).round().clamp(0.0, 255.0) as u8])
    })
}

// -- Adaptive threshold -------------------------------------------------------

/// Gaussian-weighted adaptive threshold.
///
/// The local mean is a `block_size` x `block_size` Gaussian blur of the
/// input (sigma derived from the block size). A pixel becomes white (255)
/// when it is brighter than `local_mean - c`, black (0) otherwise.
pub fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let mean = gaussian_blur(gray, block_size);
    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as i32;
        let local = mean.get_pixel(x, y).0[0] as i32;
        if value - local > -c {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Sigma used for a Gaussian kernel of the given odd size when none is
/// supplied explicitly.
pub fn gaussian_sigma_for(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let sigma = gaussian_sigma_for(ksize);
    let centre = (ksize as f32 - 1.0) * 0.5;
    let coeff = -0.5 / (sigma * sigma);

    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let d = i as f32 - centre;
            (d * d * coeff).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur with a `ksize`-tap kernel and replicated borders.
///
/// The horizontal pass stays in `f32` and the result is rounded once, so a
/// flat region keeps its exact level.
fn gaussian_blur(gray: &GrayImage, ksize: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let kernel = gaussian_kernel(ksize.max(1) | 1);
    let half = (kernel.len() / 2) as i64;
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    let mut horizontal = vec![0.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (i, k) in kernel.iter().enumerate() {
                let sx = (x as i64 + i as i64 - half).clamp(0, max_x) as u32;
                acc += k * gray.get_pixel(sx, y).0[0] as f32;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0.0f32;
        for (i, k) in kernel.iter().enumerate() {
            let sy = (y as i64 + i as i64 - half).clamp(0, max_y) as u32;
            acc += k * horizontal[(sy * width + x) as usize];
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

// -- Morphology ---------------------------------------------------------------

/// Which way a 2x2 window extends from the pixel it writes.
#[derive(Debug, Clone, Copy)]
enum Window {
    /// The pixel plus its left, upper and upper-left neighbours.
    Backward,
    /// The pixel plus its right, lower and lower-right neighbours.
    Forward,
}

impl Window {
    fn range(self, v: u32, len: u32) -> std::ops::RangeInclusive<u32> {
        match self {
            Window::Backward => v.saturating_sub(1)..=v,
            Window::Forward => v..=(v + 1).min(len - 1),
        }
    }
}

/// Max (or min) over a 2x2 window. Neighbours outside the image are ignored.
fn rank_2x2(gray: &GrayImage, window: Window, take_max: bool) -> GrayImage {
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = if take_max { u8::MIN } else { u8::MAX };
        for sy in window.range(y, height) {
            for sx in window.range(x, width) {
                let v = gray.get_pixel(sx, sy).0[0];
                acc = if take_max { acc.max(v) } else { acc.min(v) };
            }
        }
        Luma([acc])
    })
}

/// Morphological closing with a 2x2 square: dilation followed by erosion with
/// the reflected element, so shapes larger than the element do not shift.
///
/// On dark-text-on-light images this removes dark specks and breaks thinner
/// than the element while keeping stroke outlines in place.
pub fn close_2x2(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let dilated = rank_2x2(gray, Window::Backward, true);
    rank_2x2(&dilated, Window::Forward, false)
}

/// Morphological opening with a 2x2 square: erosion followed by dilation with
/// the reflected element.
///
/// On dark-text-on-light images this fills light pinholes and gaps inside
/// strokes.
pub fn open_2x2(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let eroded = rank_2x2(gray, Window::Backward, false);
    rank_2x2(&eroded, Window::Forward, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn count_value(img: &GrayImage, value: u8) -> usize {
        img.pixels().filter(|p| p.0[0] == value).count()
    }

    #[test]
    fn clip_histogram_preserves_total() {
        let mut hist = [0u32; BINS];
        hist[10] = 500;
        hist[200] = 300;
        clip_histogram(&mut hist, 40);

        let total: u32 = hist.iter().sum();
        assert_eq!(total, 800);
        assert!(hist[10] < 500);
    }

    #[test]
    fn clahe_keeps_dimensions_on_odd_sizes() {
        let img = GrayImage::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn clahe_on_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, Luma([90u8]));
        let out = clahe(&img, 2.0, 8);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn clahe_stretches_low_contrast_gradient() {
        // Values squeezed into 100..=115.
        let img = GrayImage::from_fn(128, 128, |x, _| Luma([100 + (x / 8) as u8]));
        let out = clahe(&img, 40.0, 8);

        let (min, max) = out
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        assert!(max - min > 40, "expected wider range, got {min}..{max}");
    }

    #[test]
    fn bilateral_preserves_hard_edge() {
        let img = GrayImage::from_fn(40, 20, |x, _| if x < 20 { Luma([0u8]) } else { Luma([255u8]) });
        let out = bilateral(&img, 9, 75.0, 75.0);

        // A 255 step is far outside sigma_color, so neighbours across the
        // edge contribute almost nothing.
        assert!(out.get_pixel(18, 10).0[0] < 5);
        assert!(out.get_pixel(21, 10).0[0] > 250);
    }

    #[test]
    fn bilateral_smooths_small_noise() {
        let mut img = GrayImage::from_pixel(21, 21, Luma([120u8]));
        img.put_pixel(10, 10, Luma([140u8]));
        let out = bilateral(&img, 9, 75.0, 75.0);
        let centre = out.get_pixel(10, 10).0[0];
        assert!(centre < 140 && centre >= 120, "got {centre}");
    }

    #[test]
    fn gaussian_sigma_for_block_31() {
        assert!((gaussian_sigma_for(31) - 5.0).abs() < 1e-5);
        let kernel = gaussian_kernel(31);
        assert_eq!(kernel.len(), 31);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(kernel[15] > kernel[0]);
    }

    #[test]
    fn gaussian_blur_keeps_flat_levels_exact() {
        for level in [0u8, 1, 37, 128, 200, 254, 255] {
            let img = GrayImage::from_pixel(40, 35, Luma([level]));
            let out = gaussian_blur(&img, 31);
            assert!(out.pixels().all(|p| p.0[0] == level), "level {level} drifted");
        }
    }

    #[test]
    fn gaussian_blur_averages_a_step_symmetrically() {
        let img = GrayImage::from_fn(64, 8, |x, _| if x < 32 { Luma([0u8]) } else { Luma([200u8]) });
        let out = gaussian_blur(&img, 31);
        let left = out.get_pixel(31, 4).0[0] as i32;
        let right = out.get_pixel(32, 4).0[0] as i32;
        // Mirror pixels around the step sum to the full step height.
        assert!((left + right - 200).abs() <= 1, "got {left} + {right}");
        assert_eq!(out.get_pixel(0, 4).0[0], 0);
        assert_eq!(out.get_pixel(63, 4).0[0], 200);
    }

    #[test]
    fn adaptive_threshold_uniform_is_white() {
        let img = GrayImage::from_pixel(50, 50, Luma([60u8]));
        let out = adaptive_threshold_gaussian(&img, 31, 15);
        assert_eq!(count_value(&out, 255), 50 * 50);
    }

    #[test]
    fn adaptive_threshold_handles_uneven_lighting() {
        // Gradient background, dark strokes in both the bright and the dim half.
        let mut img = GrayImage::from_fn(120, 60, |x, _| Luma([(230 - x) as u8]));
        draw_filled_rect_mut(&mut img, Rect::at(10, 20).of_size(4, 20), Luma([150u8]));
        draw_filled_rect_mut(&mut img, Rect::at(100, 20).of_size(4, 20), Luma([60u8]));

        let out = adaptive_threshold_gaussian(&img, 31, 15);
        assert_eq!(out.get_pixel(11, 30).0[0], 0);
        assert_eq!(out.get_pixel(101, 30).0[0], 0);
        assert_eq!(out.get_pixel(50, 5).0[0], 255);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn closing_removes_isolated_dark_speck() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([255u8]));
        img.put_pixel(4, 4, Luma([0u8]));
        let out = close_2x2(&img);
        assert_eq!(count_value(&out, 0), 0);
    }

    #[test]
    fn opening_fills_isolated_light_pinhole() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0u8]));
        img.put_pixel(5, 5, Luma([255u8]));
        let out = open_2x2(&img);
        assert_eq!(count_value(&out, 255), 0);
    }

    #[test]
    fn close_and_open_keep_large_strokes_in_place() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([255u8]));
        draw_filled_rect_mut(&mut img, Rect::at(8, 5).of_size(3, 20), Luma([0u8]));

        let out = open_2x2(&close_2x2(&img));
        assert_eq!(out, img);
    }
}
