// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `TextRecognizer` backed by ocrs, which runs its detection and recognition
// networks on rten. Compiled only with the `ocr` feature.
//
// Both models (`text-detection.rten`, `text-recognition.rten`) are read from
// one directory. `ocrs-cli` downloads them to `~/.cache/ocrs` on first run,
// which is the default here.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use rten_imageproc::RotatedRect;
use textlift_core::error::{Result, TextliftError};
use textlift_core::types::RecognizedLine;
use tracing::{debug, info, instrument};

use super::recognize::TextRecognizer;

const DETECTION_MODEL: &str = "text-detection.rten";
const RECOGNITION_MODEL: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, else `~/.cache/ocrs`, else `./ocrs-models`.
fn cache_dir() -> PathBuf {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .map(|base| base.join("ocrs"))
        .unwrap_or_else(|| PathBuf::from("ocrs-models"))
}

/// Directory holding the detection and recognition models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub model_dir: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::new(cache_dir())
    }
}

impl OcrConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn detection_model(&self) -> PathBuf {
        self.model_dir.join(DETECTION_MODEL)
    }

    pub fn recognition_model(&self) -> PathBuf {
        self.model_dir.join(RECOGNITION_MODEL)
    }

    pub fn models_present(&self) -> bool {
        self.detection_model().is_file() && self.recognition_model().is_file()
    }
}

/// Text recogniser built on `ocrs`.
///
/// Loading the models is the expensive step and happens once in
/// [`OcrsRecognizer::new`]; the instance is then shared across requests.
///
/// **Important:** `ocrs` and `rten` must be compiled in release mode. Debug
/// builds are 10-100x slower.
pub struct OcrsRecognizer {
    engine: OcrsEngine,
}

impl OcrsRecognizer {
    /// Load both models from `config.model_dir`. Missing files are reported
    /// before any model is parsed.
    #[instrument(skip_all, fields(model_dir = %config.model_dir.display()))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        if !config.models_present() {
            return Err(TextliftError::OcrError(format!(
                "{} and {} must both exist in {}; run `ocrs-cli` once to download them",
                DETECTION_MODEL,
                RECOGNITION_MODEL,
                config.model_dir.display()
            )));
        }

        let detection_model = load_model("detection", &config.detection_model())?;
        let recognition_model = load_model("recognition", &config.recognition_model())?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| TextliftError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Recognise text lines in an in-memory image.
    ///
    /// Word detection, line grouping and line recognition run in turn; blank
    /// lines are dropped.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn recognize_image(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            TextliftError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| TextliftError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| TextliftError::OcrError(format!("word detection failed: {}", err)))?;
        debug!(word_count = word_rects.len(), "Words detected");

        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        debug!(line_count = line_rects.len(), "Text lines found");

        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| TextliftError::OcrError(format!("line recognition failed: {}", err)))?;

        let mut results = Vec::with_capacity(line_texts.len());
        for (words, line) in line_rects.iter().zip(line_texts.iter()) {
            let Some(line) = line else { continue };
            let text = line.to_string();
            if text.trim().is_empty() {
                continue;
            }
            results.push(RecognizedLine {
                geometry: line_geometry(words),
                text,
                confidence: None,
            });
        }

        info!(recognized_lines = results.len(), "OCR complete");
        Ok(results)
    }
}

impl TextRecognizer for OcrsRecognizer {
    #[instrument(skip(self, image_path), fields(path = %image_path.display()))]
    fn recognize(
        &self,
        image_path: &Path,
        classify_orientation: bool,
    ) -> Result<Vec<RecognizedLine>> {
        // The ocrs detector emits rotated boxes itself; there is no separate
        // orientation classifier to switch on.
        debug!(classify_orientation, "Orientation handled by the detector");

        let image = image::open(image_path).map_err(|err| {
            TextliftError::OcrError(format!(
                "failed to read {} for recognition: {}",
                image_path.display(),
                err
            ))
        })?;
        self.recognize_image(&image)
    }

    fn name(&self) -> &str {
        "ocrs"
    }
}

fn load_model(kind: &str, path: &Path) -> Result<Model> {
    info!(kind, "Loading OCR model");
    Model::load_file(path).map_err(|err| {
        TextliftError::OcrError(format!(
            "failed to load {kind} model from {}: {}",
            path.display(),
            err
        ))
    })
}

/// Axis-aligned corners (top-left, top-right, bottom-right, bottom-left)
/// enclosing all word boxes of a line.
fn line_geometry(words: &[RotatedRect]) -> [(f32, f32); 4] {
    let mut min = (f32::MAX, f32::MAX);
    let mut max = (f32::MIN, f32::MIN);
    for corner in words.iter().flat_map(|word| word.corners()) {
        min = (min.0.min(corner.x), min.1.min(corner.y));
        max = (max.0.max(corner.x), max.1.max(corner.y));
    }
    if words.is_empty() {
        return [(0.0, 0.0); 4];
    }
    [(min.0, min.1), (max.0, min.1), (max.0, max.1), (min.0, max.1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_paths_live_in_model_dir() {
        let config = OcrConfig::new("/opt/textlift/models");
        assert_eq!(
            config.detection_model(),
            PathBuf::from("/opt/textlift/models/text-detection.rten")
        );
        assert_eq!(
            config.recognition_model(),
            PathBuf::from("/opt/textlift/models/text-recognition.rten")
        );
    }

    #[test]
    fn missing_models_are_reported_without_loading() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(DETECTION_MODEL), b"not a model").expect("write");

        let config = OcrConfig::new(dir.path());
        assert!(!config.models_present());
        match OcrsRecognizer::new(&config) {
            Err(TextliftError::OcrError(msg)) => assert!(msg.contains(RECOGNITION_MODEL)),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("engine built without models"),
        }
    }

    #[test]
    fn empty_line_geometry_is_zeroed() {
        assert_eq!(line_geometry(&[]), [(0.0, 0.0); 4]);
    }

    /// Needs the ocrs models in the default cache directory.
    #[test]
    #[ignore = "requires downloaded ocrs models"]
    fn blank_page_yields_no_lines() {
        let config = OcrConfig::default();
        if !config.models_present() {
            return;
        }
        let engine = OcrsRecognizer::new(&config).expect("load models");
        let blank = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            1200,
            600,
            image::Luma([255u8]),
        ));
        let lines = engine.recognize_image(&blank).expect("recognize");
        assert!(lines.is_empty());
    }
}
