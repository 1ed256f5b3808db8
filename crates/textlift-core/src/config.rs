// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.
//
// Resolution order: built-in defaults, then an optional JSON file named by
// `TEXTLIFT_CONFIG`, then individual `TEXTLIFT_*` environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TextliftError};
use crate::types::MAX_UPLOAD_BYTES;

/// Environment variable naming a JSON config file.
pub const CONFIG_FILE_ENV: &str = "TEXTLIFT_CONFIG";

/// Runtime settings for the OCR server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Directory holding per-request scratch files. Created on demand.
    pub scratch_dir: PathBuf,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Ask the recognition engine to classify text orientation.
    pub classify_orientation: bool,
    /// Directory containing the recognition models. `None` selects the
    /// engine's default cache location.
    pub model_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            scratch_dir: PathBuf::from("temp"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            classify_orientation: true,
            model_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the environment.
    ///
    /// A file named by `TEXTLIFT_CONFIG` must exist and parse; individual
    /// overrides that fail to parse are logged and skipped.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup);
        Ok(config)
    }

    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            TextliftError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "Configuration file loaded");
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TEXTLIFT_HOST") {
            self.host = host;
        }
        if let Some(port) = parse_override::<u16>(lookup, "TEXTLIFT_PORT") {
            self.port = port;
        }
        if let Some(dir) = lookup("TEXTLIFT_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = parse_override::<usize>(lookup, "TEXTLIFT_MAX_UPLOAD_BYTES") {
            if bytes > 0 {
                self.max_upload_bytes = bytes;
            } else {
                warn!("Ignoring TEXTLIFT_MAX_UPLOAD_BYTES=0; the limit must be positive");
            }
        }
        if let Some(flag) = parse_override::<bool>(lookup, "TEXTLIFT_CLASSIFY_ORIENTATION") {
            self.classify_orientation = flag;
        }
        if let Some(dir) = lookup("TEXTLIFT_MODEL_DIR") {
            self.model_dir = Some(PathBuf::from(dir));
        }
    }

    /// Socket address to bind, validated.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| {
                TextliftError::Config(format!(
                    "invalid bind address {}:{}: {}",
                    self.host, self.port, err
                ))
            })
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %value, "Ignoring unparseable configuration override");
            None
        }
    }
}
