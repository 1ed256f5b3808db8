// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request-level errors and their HTTP representation.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use textlift_core::error::TextliftError;
use thiserror::Error;

const MIB: usize = 1024 * 1024;

/// Why an OCR request did not produce text.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request carried no `image` field.
    #[error("no image uploaded")]
    MissingInput,

    /// The upload exceeded the configured size cap.
    #[error("image exceeds {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },

    /// Persisting, enhancing or recognising the image failed.
    #[error("OCR processing failed: {0}")]
    Processing(#[from] TextliftError),

    /// The worker running the request died (panicked or was cancelled).
    #[error("request worker failed: {0}")]
    Worker(String),
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Processing(_) | Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing body. Only the error's display text is exposed as
    /// `details`, never a backtrace.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::MissingInput => ErrorBody {
                error: "No image uploaded".to_string(),
                details: None,
            },
            Self::PayloadTooLarge { limit_bytes } => ErrorBody {
                error: format!("Image too large (max {})", format_limit(*limit_bytes)),
                details: None,
            },
            Self::Processing(err) => ErrorBody {
                error: "OCR processing failed".to_string(),
                details: Some(err.to_string()),
            },
            Self::Worker(reason) => ErrorBody {
                error: "OCR processing failed".to_string(),
                details: Some(reason.clone()),
            },
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// `10MB` for whole mebibytes, otherwise a byte count.
fn format_limit(bytes: usize) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}
