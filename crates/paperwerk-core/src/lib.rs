// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paperwerk — Core types, collaborator traits, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod locks;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use error::PaperwerkError;
pub use fingerprint::{fingerprint_bytes, verify_fingerprint};
pub use locks::ArchiveLocks;
pub use traits::{DocumentArchive, DocumentIndex, Documents, PageAnalyzer, PagePreprocessor};
pub use types::*;
