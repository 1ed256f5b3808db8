// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface: `POST /ocr` and `GET /health`.
//
// The handler only parses the multipart body and enforces the size cap while
// streaming the `image` field. Everything else runs in the coordinator on a
// blocking-pool thread.

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use textlift_core::config::ServerConfig;
use textlift_core::error::{Result, TextliftError};
use textlift_core::types::UploadedImage;
use textlift_document::TextRecognizer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::coordinator::RequestCoordinator;
use crate::error::RequestError;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<RequestCoordinator>,
}

/// Successful OCR response: recognised lines in engine order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    pub text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the router around a coordinator.
///
/// The body limit is twice the upload cap so that oversize uploads reach the
/// handler's own 413 path instead of failing mid-parse.
pub fn create_router(coordinator: Arc<RequestCoordinator>) -> Router {
    let body_limit = coordinator.max_upload_bytes().saturating_mul(2);
    let state = ApiState { coordinator };

    Router::new()
        .route("/ocr", post(ocr_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OCR endpoint handler.
///
/// POST /ocr
///
/// Expects multipart form data with an `image` file field. Bodies that are
/// not multipart at all are treated as carrying no image.
pub async fn ocr_handler(
    State(state): State<ApiState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<OcrResponse>, RequestError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!(reason = %rejection, "Request is not multipart");
        RequestError::MissingInput
    })?;

    let limit = state.coordinator.max_upload_bytes();
    let upload = read_image_field(&mut multipart, limit).await?;

    let coordinator = Arc::clone(&state.coordinator);
    let result = tokio::task::spawn_blocking(move || coordinator.handle(upload))
        .await
        .map_err(|join_err| {
            tracing::error!(error = %join_err, "OCR worker did not complete");
            RequestError::Worker(if join_err.is_panic() {
                "worker panicked".to_string()
            } else {
                "worker cancelled".to_string()
            })
        })??;

    Ok(Json(OcrResponse {
        text: result.into_texts(),
    }))
}

/// Health check endpoint handler.
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Find the `image` file part and buffer it, stopping as soon as `limit` is
/// exceeded. Other fields, and an `image` part sent as a plain form value
/// (no filename), are skipped. `Ok(None)` when there is no image file.
async fn read_image_field(
    multipart: &mut Multipart,
    limit: usize,
) -> std::result::Result<Option<UploadedImage>, RequestError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(RequestError::PayloadTooLarge { limit_bytes: limit });
            }
            Err(err) => {
                debug!(error = %err, "Malformed multipart body");
                return Err(RequestError::MissingInput);
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Ignoring image part without a filename");
            continue;
        };

        let data = read_capped(field, limit).await?;
        debug!(filename = %filename, bytes = data.len(), "Image field received");
        return Ok(Some(UploadedImage::new(filename, data)));
    }
}

async fn read_capped(
    mut field: Field<'_>,
    limit: usize,
) -> std::result::Result<Vec<u8>, RequestError> {
    let mut data = Vec::new();
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if data.len() + chunk.len() > limit {
                    info!(limit, "Upload exceeded size cap while streaming");
                    return Err(RequestError::PayloadTooLarge { limit_bytes: limit });
                }
                data.extend_from_slice(&chunk);
            }
            Ok(None) => return Ok(data),
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(RequestError::PayloadTooLarge { limit_bytes: limit });
            }
            Err(err) => {
                debug!(error = %err, "Image field truncated");
                return Err(RequestError::MissingInput);
            }
        }
    }
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
pub async fn serve(config: ServerConfig, recognizer: Arc<dyn TextRecognizer>) -> Result<()> {
    let addr = config.bind_addr()?;
    let coordinator = Arc::new(RequestCoordinator::new(&config, recognizer));
    let app = create_router(coordinator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        scratch_dir = %config.scratch_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Textlift OCR server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(TextliftError::Io)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(err) => warn!(error = %err, "Cannot listen for Ctrl-C; shutting down"),
    }
}
