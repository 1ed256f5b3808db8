// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-request OCR lifecycle.
//
//   RECEIVED -> SIZE_CHECKED -> PERSISTED -> ENHANCED -> RECOGNIZED -> RESPONDED
//
// Validation failures return before any scratch path is reserved. From
// PERSISTED onwards the request owns a `ScratchFiles` guard, so cleanup runs
// however `handle` exits.

use std::sync::Arc;

use textlift_core::config::ServerConfig;
use textlift_core::error::Result;
use textlift_core::types::{MAX_UPLOAD_BYTES, RecognitionResult, UploadedImage};
use textlift_document::{TextRecognizer, enhance_file};
use tracing::{debug, error, info, instrument};

use crate::error::RequestError;
use crate::scratch::{ScratchDir, ScratchFiles};

/// Runs one upload through persist, enhance and recognise.
///
/// Holds no per-request state, so a single instance is shared by all
/// workers.
pub struct RequestCoordinator {
    scratch: ScratchDir,
    recognizer: Arc<dyn TextRecognizer>,
    max_upload_bytes: usize,
    classify_orientation: bool,
}

impl RequestCoordinator {
    /// Build a coordinator around an already initialised recognition engine.
    pub fn new(config: &ServerConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            scratch: ScratchDir::new(&config.scratch_dir),
            recognizer,
            max_upload_bytes: config.max_upload_bytes,
            classify_orientation: config.classify_orientation,
        }
    }

    /// Coordinator with default limits writing scratch files under `scratch_dir`.
    pub fn with_scratch_dir(
        scratch_dir: impl Into<std::path::PathBuf>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            scratch: ScratchDir::new(scratch_dir),
            recognizer,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            classify_orientation: true,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Process one upload to completion.
    ///
    /// `Ok` with an empty result means the image held no text. Every scratch
    /// file written along the way is gone when this returns or unwinds.
    #[instrument(skip_all, fields(engine = self.recognizer.name()))]
    pub fn handle(
        &self,
        upload: Option<UploadedImage>,
    ) -> std::result::Result<RecognitionResult, RequestError> {
        let upload = upload.ok_or(RequestError::MissingInput)?;
        if upload.len() > self.max_upload_bytes {
            info!(
                bytes = upload.len(),
                limit = self.max_upload_bytes,
                "Upload rejected as too large"
            );
            return Err(RequestError::PayloadTooLarge {
                limit_bytes: self.max_upload_bytes,
            });
        }

        let files = self.scratch.reserve(&upload.filename);
        match self.process(&upload, &files) {
            Ok(result) => {
                info!(
                    token = %files.token(),
                    lines = result.lines.len(),
                    "OCR request complete"
                );
                Ok(result)
            }
            Err(err) => {
                error!(token = %files.token(), error = ?err, "OCR processing failed");
                Err(RequestError::Processing(err))
            }
        }
    }

    fn process(&self, upload: &UploadedImage, files: &ScratchFiles) -> Result<RecognitionResult> {
        self.scratch.ensure_exists()?;
        files.write_original(&upload.data)?;

        let raster = enhance_file(files.original_path())?;
        raster.save_png(files.processed_path())?;
        debug!(
            width = raster.width(),
            height = raster.height(),
            "Enhanced image persisted"
        );
        drop(raster);

        let lines = self
            .recognizer
            .recognize(files.processed_path(), self.classify_orientation)?;
        Ok(RecognitionResult::new(lines))
    }
}
