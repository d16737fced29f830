// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paperwerk storage — SQLite entity store, filesystem content archive, and
// SQLite FTS5 document index.

pub mod archive;
pub mod documents;
pub mod index;

pub use archive::FileSystemArchive;
pub use documents::SqliteDocuments;
pub use index::SqliteDocumentIndex;
