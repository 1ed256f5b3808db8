// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// textlift-server — HTTP OCR service.
//
// Accepts image uploads, persists them to request-scoped scratch files, runs
// the enhancement pipeline and a pluggable text recogniser, and answers with
// the recognised lines.

pub mod coordinator;
pub mod error;
pub mod http;
pub mod scratch;

pub use coordinator::RequestCoordinator;
pub use error::{ErrorBody, RequestError};
pub use http::{ApiState, HealthResponse, OcrResponse, create_router, serve};
pub use scratch::{ScratchDir, ScratchFiles, sanitize_filename};
