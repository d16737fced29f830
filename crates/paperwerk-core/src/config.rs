// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PaperwerkError, Result};

/// Environment variable naming the data directory. Read by the command line
/// parser; an explicit `--data-dir` wins over it.
pub const ENV_DATA_DIR: &str = "PAPERWERK_DATA_DIR";
/// Environment variable overriding the log filter.
pub const ENV_LOG: &str = "PAPERWERK_LOG";
/// Environment variable overriding the Tesseract executable.
pub const ENV_TESSERACT: &str = "PAPERWERK_TESSERACT";
/// Environment variable overriding the recognition languages.
pub const ENV_OCR_LANGUAGES: &str = "PAPERWERK_OCR_LANGUAGES";

/// Persistent engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for the database, the search index and the archive.
    pub data_dir: PathBuf,
    /// Entity store file name, relative to `data_dir`.
    pub database_file: String,
    /// Search index file name, relative to `data_dir`.
    pub index_file: String,
    /// Content archive directory name, relative to `data_dir`.
    pub archive_dir: String,
    /// Executable used for text recognition.
    pub tesseract_executable: String,
    /// Tesseract language list, `+` separated.
    pub ocr_languages: String,
    /// Directory holding `ocrs` detection/recognition models.
    pub ocr_model_dir: Option<PathBuf>,
    /// Documents written per transaction during a bulk reindex.
    pub index_batch_size: u64,
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            database_file: "paperwerk.db".into(),
            index_file: "index.db".into(),
            archive_dir: "archive".into(),
            tesseract_executable: "tesseract".into(),
            ocr_languages: "eng+deu".into(),
            ocr_model_dir: None,
            index_batch_size: 100,
            log_filter: "info".into(),
        }
    }
}

impl EngineConfig {
    /// Default settings rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_dir)
    }

    /// Apply `PAPERWERK_*` setting overrides. `lookup` is normally
    /// `std::env::var` mapped to an `Option`. The data directory is not
    /// touched; `config.json` was already read from it.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
        if let Some(exe) = lookup(ENV_TESSERACT).filter(|v| !v.is_empty()) {
            self.tesseract_executable = exe;
        }
        if let Some(langs) = lookup(ENV_OCR_LANGUAGES).filter(|v| !v.is_empty()) {
            self.ocr_languages = langs;
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.index_batch_size == 0 {
            return Err(PaperwerkError::Config(
                "index_batch_size must be greater than zero".into(),
            ));
        }
        if self.ocr_languages.trim().is_empty() {
            return Err(PaperwerkError::Config("ocr_languages must not be empty".into()));
        }
        if self.tesseract_executable.trim().is_empty() {
            return Err(PaperwerkError::Config(
                "tesseract_executable must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("database_file", &self.database_file),
            ("index_file", &self.index_file),
            ("archive_dir", &self.archive_dir),
        ] {
            if value.trim().is_empty() {
                return Err(PaperwerkError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}
