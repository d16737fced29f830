// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract recognizer — runs the `tesseract` command line tool with the page
// image on stdin and reads the text from stdout.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use tracing::{debug, instrument};

use paperwerk_core::error::{PaperwerkError, Result};

use super::analyzer::TextRecognizer;

/// [`TextRecognizer`] that shells out to Tesseract.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: String,
    languages: String,
}

impl TesseractRecognizer {
    /// `languages` is Tesseract's `+`-separated list, e.g. `eng+deu`.
    pub fn new(executable: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            languages: languages.into(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", "eng+deu")
    }
}

impl TextRecognizer for TesseractRecognizer {
    #[instrument(skip(self, content), fields(executable = %self.executable, languages = %self.languages, len = content.len()))]
    fn recognize(&self, content: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.executable)
            .args(["-l", &self.languages, "stdin", "stdout"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PaperwerkError::Analysis(format!(
                    "{} not found (install tesseract-ocr)",
                    self.executable
                )),
                _ => PaperwerkError::Analysis(format!("failed to start {}: {e}", self.executable)),
            })?;

        // Tesseract reads all of stdin before it writes anything.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(content) {
                debug!(error = %e, "tesseract closed stdin early");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| PaperwerkError::Analysis(format!("waiting for {}: {e}", self.executable)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PaperwerkError::Analysis(format!(
                "{} exited with {}: {}",
                self.executable,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(chars = text.len(), "tesseract finished");
        Ok(text)
    }
}
