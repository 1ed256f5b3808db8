// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Textlift OCR service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload size cap: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Random per-request token used to partition the scratch namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScratchToken(pub Uuid);

impl ScratchToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScratchToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScratchToken {
    /// Simple (hyphen-free) hex form, suitable as a filename prefix.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// An image upload as received from the client.
///
/// Owned by exactly one request and dropped when the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Filename declared by the client (untrusted).
    pub filename: String,
    /// Raw encoded image bytes.
    pub data: Vec<u8>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single line of text reported by the recognition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    /// Corner points of the line's (possibly rotated) bounding box, in
    /// enhanced-image pixel coordinates.
    pub geometry: [(f32, f32); 4],
    /// The recognised text.
    pub text: String,
    /// Engine confidence in `0.0..=1.0`, when the engine reports one.
    pub confidence: Option<f32>,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            geometry: [(0.0, 0.0); 4],
            text: text.into(),
            confidence: None,
        }
    }
}

impl std::fmt::Display for RecognizedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered recognition output for one image.
///
/// An empty result means "no text found", which is a successful outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub lines: Vec<RecognizedLine>,
}

impl RecognitionResult {
    pub fn new(lines: Vec<RecognizedLine>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line texts in engine order, with geometry and confidence dropped.
    pub fn into_texts(self) -> Vec<String> {
        self.lines.into_iter().map(|line| line.text).collect()
    }
}
