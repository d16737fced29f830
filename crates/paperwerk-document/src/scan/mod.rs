// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning — text recognition over preprocessed page images.

pub mod analyzer;
pub mod tesseract;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use analyzer::{PageScanner, TextRecognizer};
pub use tesseract::TesseractRecognizer;

#[cfg(feature = "ocr")]
pub use ocr::OcrsRecognizer;
