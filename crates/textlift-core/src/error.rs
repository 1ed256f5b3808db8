// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Textlift.

use thiserror::Error;

/// Top-level error type for all Textlift operations.
#[derive(Debug, Error)]
pub enum TextliftError {
    // -- Image errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    // -- Scratch storage --
    #[error("scratch storage error: {0}")]
    Scratch(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TextliftError>;
