// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine-agnostic text recognition interface.

use std::path::Path;

use textlift_core::error::Result;
use textlift_core::types::RecognizedLine;

/// A text recognition engine.
///
/// Implementations are built once at startup (model loading is expensive)
/// and shared across request workers, hence `Send + Sync`.
pub trait TextRecognizer: Send + Sync {
    /// Recognise the text lines in the image stored at `image_path`.
    ///
    /// Lines come back in the engine's reading order. An empty vector means
    /// the image contains no recognisable text and is not an error.
    /// `classify_orientation` asks the engine to detect and correct rotated
    /// text where it supports doing so.
    fn recognize(&self, image_path: &Path, classify_orientation: bool)
    -> Result<Vec<RecognizedLine>>;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}
