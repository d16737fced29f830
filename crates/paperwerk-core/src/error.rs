// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Paperwerk.

use thiserror::Error;

/// Top-level error type for all Paperwerk operations.
#[derive(Debug, Error)]
pub enum PaperwerkError {
    // -- Lookup --
    #[error("not found: {0}")]
    NotFound(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("content archive error: {0}")]
    Archive(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Stage errors --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("page conversion failed: {0}")]
    Conversion(String),

    #[error("text recognition failed: {0}")]
    Analysis(String),

    #[error("document index error: {0}")]
    Index(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// Archive and entity store disagree about where a page's content lives
    /// and the automatic rollback did not succeed.
    #[error("content archive and record out of sync: {0}")]
    Inconsistent(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PaperwerkError {
    /// Whether this error means the archive and the store can no longer be
    /// reconciled without manual intervention.
    pub fn requires_operator(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperwerkError>;
