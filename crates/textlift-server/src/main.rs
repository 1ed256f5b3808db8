// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Textlift — OCR server binary.
//
// Entry point. Initialises logging, loads configuration and the recognition
// models, then serves HTTP until interrupted.

use std::process::ExitCode;
use std::sync::Arc;

use textlift_core::config::ServerConfig;
use textlift_core::error::{Result, TextliftError};
use textlift_document::{OcrConfig, OcrsRecognizer, TextRecognizer};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Textlift starting");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Textlift failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;

    // Model loading is slow and synchronous; do it once, off the runtime.
    let ocr_config = config.model_dir.clone().map(OcrConfig::new).unwrap_or_default();
    let recognizer = tokio::task::spawn_blocking(move || OcrsRecognizer::new(&ocr_config))
        .await
        .map_err(|err| TextliftError::OcrError(format!("model loading task failed: {err}")))??;

    let recognizer: Arc<dyn TextRecognizer> = Arc::new(recognizer);
    textlift_server::serve(config, recognizer).await
}
