// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the text enhancement pipeline.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use textlift_document::enhance_image;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full pipeline on a 400x200 page with a few dark text bars. The image is
/// below the minimum width, so the upscale stage is included.
fn bench_enhance_small_page(c: &mut Criterion) {
    let mut img = GrayImage::from_pixel(400, 200, Luma([225u8]));
    for row in 0..4 {
        draw_filled_rect_mut(
            &mut img,
            Rect::at(40, 30 + row * 40).of_size(300, 6),
            Luma([25u8]),
        );
    }
    let dynamic = DynamicImage::ImageLuma8(img);

    c.bench_function("enhance (400x200)", |b| {
        b.iter(|| {
            black_box(enhance_image(black_box(dynamic.clone())).expect("enhance"));
        });
    });
}

criterion_group!(benches, bench_enhance_small_page);
criterion_main!(benches);
