// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — enhancement of uploaded images for legibility, and
// optical character recognition (OCR).

pub mod enhance;
pub mod filters;
pub mod recognize;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use enhance::{EnhancedRaster, TextEnhancer};
pub use recognize::TextRecognizer;

#[cfg(feature = "ocr")]
pub use ocr::OcrsRecognizer;
