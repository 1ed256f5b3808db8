// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// textlift-document — Image enhancement and text recognition for Textlift.
//
// Provides the OCR enhancement pipeline (grayscale, CLAHE, bilateral
// smoothing, adaptive binarisation, morphology, minimum-width upscaling) and
// the `TextRecognizer` interface with an optional `ocrs`-backed engine.

pub mod scan;

// Re-export the primary items so callers can use `textlift_document::TextEnhancer` etc.
pub use scan::enhance::{EnhancedRaster, TextEnhancer, enhance_bytes, enhance_file, enhance_image};
pub use scan::recognize::TextRecognizer;

#[cfg(feature = "ocr")]
pub use scan::ocr::{OcrConfig, OcrsRecognizer};
