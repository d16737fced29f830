// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator traits consumed by the workflow engine.
//
// All collaborators are synchronous and shareable across threads; the
// workflow crate calls them from Tokio's blocking pool.

use crate::error::Result;
use crate::types::{
    ContentKey, Document, DocumentNumber, DocumentPage, PageNumber, PageRequest, SearchResults,
};

/// Persistence for documents and their pages.
///
/// Lookups return `Ok(None)` when the record does not exist.
pub trait Documents: Send + Sync {
    /// Load a document together with its pages, ordered by page number.
    fn get_by_document_number(&self, number: DocumentNumber) -> Result<Option<Document>>;

    /// Load a page of documents (with pages) ordered by document number.
    fn find(&self, page: PageRequest) -> Result<Vec<Document>>;

    /// Insert a new document and return its assigned number. Pages on the
    /// passed value are ignored.
    fn add(&self, document: &Document) -> Result<DocumentNumber>;

    /// Persist the document's own fields (not its pages, not its claim flag).
    fn update(&self, document: &Document) -> Result<()>;

    fn get_page(&self, number: DocumentNumber, page: PageNumber) -> Result<Option<DocumentPage>>;

    /// Append a page and return its assigned page number (the number of
    /// pages the document had before).
    fn add_page(&self, page: &DocumentPage) -> Result<PageNumber>;

    /// Persist all fields of a page, including its claim flag.
    fn update_page(&self, page: &DocumentPage) -> Result<()>;

    /// Atomically flip the page's claim flag from clear to set.
    ///
    /// Returns `Ok(false)` if another review already holds the claim or the
    /// page does not exist.
    fn try_claim_page(&self, number: DocumentNumber, page: PageNumber) -> Result<bool>;

    /// Atomically flip the document's claim flag from clear to set.
    fn try_claim_document(&self, number: DocumentNumber) -> Result<bool>;

    /// Clear the document's claim flag.
    fn release_document(&self, number: DocumentNumber) -> Result<()>;

    /// Clear every document and page claim. Returns how many records were
    /// released.
    fn reset_review_claims(&self) -> Result<u64>;
}

/// Content-addressable blob store keyed by `(document number, content key)`.
pub trait DocumentArchive: Send + Sync {
    fn read_content(&self, number: DocumentNumber, key: &ContentKey) -> Result<Vec<u8>>;

    /// Write `data` under `key`, replacing any existing blob.
    fn store_content(&self, number: DocumentNumber, key: &ContentKey, data: &[u8]) -> Result<()>;

    /// Rename a blob. Fails if `from` is missing or `to` already exists.
    fn move_content(&self, number: DocumentNumber, from: &ContentKey, to: &ContentKey) -> Result<()>;

    fn delete_content(&self, number: DocumentNumber, key: &ContentKey) -> Result<()>;

    fn content_exists(&self, number: DocumentNumber, key: &ContentKey) -> Result<bool>;
}

/// Normalizes a page to the canonical format and re-addresses its content.
pub trait PagePreprocessor: Send + Sync {
    fn preprocess_page(&self, number: DocumentNumber, page: PageNumber) -> Result<()>;
}

/// Extracts text from a preprocessed page.
pub trait PageAnalyzer: Send + Sync {
    fn scan_page(&self, number: DocumentNumber, page: PageNumber) -> Result<String>;
}

/// Full-text search index over documents.
pub trait DocumentIndex: Send + Sync {
    /// Project a document and its pages into the index, replacing any
    /// previous entry.
    fn index_document(&self, number: DocumentNumber) -> Result<()>;

    /// Rebuild entries for every stored document. Returns the number indexed.
    fn index_all_documents(&self) -> Result<u64>;

    fn search(&self, query: &str, page: PageRequest) -> Result<SearchResults>;
}
