// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// paperwerk-document — Page-level stage handlers for the Paperwerk engine.
//
// Provides image decoding and TIFF normalization, the page preprocessor
// (normalize, fingerprint, re-address in the archive with rollback), and the
// page analyzer with its text recognizers (Tesseract CLI, and `ocrs` behind
// the `ocr` feature).

pub mod image;
pub mod preprocess;
pub mod scan;

pub use self::image::processor::ImageProcessor;
pub use preprocess::ImagePreprocessor;
pub use scan::analyzer::{PageScanner, TextRecognizer};
pub use scan::tesseract::TesseractRecognizer;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsRecognizer;
