// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pure-Rust text recognition with `ocrs`, for hosts without Tesseract.
//
// Only available with the `ocr` feature. The engine needs two model files in
// one directory:
//
// - `text-detection.rten` locates text regions;
// - `text-recognition.rten` decodes characters in those regions.
//
// Running `ocrs-cli` once downloads both to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default model directory.

use std::path::{Path, PathBuf};

use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use paperwerk_core::error::{PaperwerkError, Result};

use super::analyzer::TextRecognizer;
use crate::image::processor::ImageProcessor;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

fn load_model(path: &Path, kind: &str) -> Result<Model> {
    if !path.exists() {
        return Err(PaperwerkError::Config(format!(
            "{kind} model not found at {}; run `ocrs-cli` once to download models",
            path.display()
        )));
    }
    info!(path = %path.display(), "loading {kind} model");
    Model::load_file(path).map_err(|err| {
        PaperwerkError::Analysis(format!(
            "failed to load {kind} model from {}: {err}",
            path.display()
        ))
    })
}

/// [`TextRecognizer`] running the `ocrs` neural engine in-process.
///
/// Model loading is the expensive step; build one recognizer and share it.
/// `ocrs` and `rten` should be compiled in release mode.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    /// Load models from `dir`, or from [`default_model_dir`] when `None`.
    #[instrument(skip_all)]
    pub fn from_model_dir(dir: Option<&Path>) -> Result<Self> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(default_model_dir);
        let detection_model = load_model(&dir.join(DETECTION_MODEL_FILENAME), "detection")?;
        let recognition_model = load_model(&dir.join(RECOGNITION_MODEL_FILENAME), "recognition")?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| PaperwerkError::Analysis(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }
}

impl TextRecognizer for OcrsRecognizer {
    #[instrument(skip_all, fields(len = content.len()))]
    fn recognize(&self, content: &[u8]) -> Result<String> {
        let image = ImageProcessor::from_bytes(content)?.into_dynamic();
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            PaperwerkError::Analysis(format!("failed to create image source ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| PaperwerkError::Analysis(format!("OCR preprocessing failed: {err}")))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| PaperwerkError::Analysis(format!("OCR text recognition failed: {err}")))?;

        debug!(lines = text.lines().count(), "OCR recognition complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_are_a_config_error() {
        let result = OcrsRecognizer::from_model_dir(Some(Path::new("/nonexistent/ocr-models")));
        assert!(matches!(result, Err(PaperwerkError::Config(_))));
    }

    #[test]
    fn default_model_dir_ends_in_ocrs() {
        let dir = default_model_dir();
        assert!(dir.ends_with("ocrs") || dir.ends_with("ocrs-models"));
    }
}
