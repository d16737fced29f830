// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preprocessor — normalizes page content to TIFF, fingerprints it, and
// re-addresses the blob in the archive.
//
// The archive and the entity store are updated in two steps. If the store
// update fails, the archive change is rolled back so the page's persisted
// content key still addresses a readable blob. A failed rollback is logged on
// the `paperwerk::consistency` target and surfaced as
// `PaperwerkError::Inconsistent`.
//
// Archive writes, the persist and blob deletion run under the document's
// `ArchiveLocks` entry, which intake also holds while it stores a blob and
// adds the page referencing it.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::fingerprint::{fingerprint_bytes, verify_fingerprint};
use paperwerk_core::locks::ArchiveLocks;
use paperwerk_core::traits::{DocumentArchive, Documents, PagePreprocessor};
use paperwerk_core::types::{ContentKey, DocumentNumber, DocumentPage, PageNumber, PageType};

use crate::image::processor::normalize_page;

/// Log target for archive/store divergence that needs an operator.
pub const CONSISTENCY_TARGET: &str = "paperwerk::consistency";

/// What a preprocessing run did to the archive before persisting the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveChange {
    /// Nothing written or moved.
    Untouched,
    /// Pass-through content renamed from the old key to the new one.
    Moved,
    /// Converted content written under the new key.
    Stored,
}

/// [`PagePreprocessor`] that converts pages with the `image` crate.
pub struct ImagePreprocessor {
    documents: Arc<dyn Documents>,
    archive: Arc<dyn DocumentArchive>,
    locks: Arc<ArchiveLocks>,
}

impl ImagePreprocessor {
    pub fn new(documents: Arc<dyn Documents>, archive: Arc<dyn DocumentArchive>, locks: Arc<ArchiveLocks>) -> Self {
        Self {
            documents,
            archive,
            locks,
        }
    }

    /// Whether a page other than `page_number` still addresses `key`.
    ///
    /// Pages with identical content share a blob. Lookup failures count as
    /// referenced so that nothing is deleted on uncertain information.
    fn referenced_elsewhere(&self, number: DocumentNumber, page_number: PageNumber, key: &ContentKey) -> bool {
        match self.documents.get_by_document_number(number) {
            Ok(Some(document)) => document
                .pages
                .iter()
                .any(|page| page.page_number != page_number && page.content_key() == *key),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not check blob references; keeping blob");
                true
            }
        }
    }

    fn update_archive(
        &self,
        number: DocumentNumber,
        page_number: PageNumber,
        old_key: &ContentKey,
        new_key: &ContentKey,
        converted: bool,
        canonical: &[u8],
    ) -> Result<ArchiveChange> {
        if new_key == old_key {
            debug!("content key unchanged; archive untouched");
            return Ok(ArchiveChange::Untouched);
        }
        if self.archive.content_exists(number, new_key)? {
            debug!(key = %new_key, "identical content already archived");
            return Ok(ArchiveChange::Untouched);
        }
        // A shared raw blob stays where it is for the other pages.
        if converted || self.referenced_elsewhere(number, page_number, old_key) {
            self.archive.store_content(number, new_key, canonical)?;
            Ok(ArchiveChange::Stored)
        } else {
            self.archive.move_content(number, old_key, new_key)?;
            Ok(ArchiveChange::Moved)
        }
    }

    /// Undo `change` after the page could not be persisted.
    fn roll_back(
        &self,
        page: &DocumentPage,
        old_key: &ContentKey,
        new_key: &ContentKey,
        change: ArchiveChange,
        original: &[u8],
    ) -> Result<()> {
        let number = page.document_number;
        match change {
            ArchiveChange::Untouched => Ok(()),
            ArchiveChange::Moved if self.referenced_elsewhere(number, page.page_number, new_key) => {
                self.archive.store_content(number, old_key, original)
            }
            ArchiveChange::Moved => self.archive.move_content(number, new_key, old_key),
            ArchiveChange::Stored if self.referenced_elsewhere(number, page.page_number, new_key) => Ok(()),
            ArchiveChange::Stored => self.archive.delete_content(number, new_key),
        }
    }

    /// Remove the superseded raw blob once the page points at its new key.
    fn discard_superseded(&self, number: DocumentNumber, page_number: PageNumber, old_key: &ContentKey) {
        if self.referenced_elsewhere(number, page_number, old_key) {
            debug!(key = %old_key, "superseded blob still referenced; keeping it");
            return;
        }
        if let Err(e) = self.archive.delete_content(number, old_key) {
            warn!(key = %old_key, error = %e, "failed to delete superseded blob");
        }
    }
}

impl PagePreprocessor for ImagePreprocessor {
    #[instrument(skip(self), fields(document = %number, page = %page_number))]
    fn preprocess_page(&self, number: DocumentNumber, page_number: PageNumber) -> Result<()> {
        let mut page = self
            .documents
            .get_page(number, page_number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number} page {page_number}")))?;

        let old_key = page.content_key();
        let original = self.archive.read_content(number, &old_key)?;

        let converted = !page.page_type.is_canonical();
        let canonical = if converted {
            debug!(from = page.page_type.as_str(), "converting page to TIFF");
            normalize_page(&original, page.page_type).map_err(|e| {
                PaperwerkError::Conversion(format!("document {number} page {page_number}: {e}"))
            })?
        } else {
            debug!("page already TIFF; skipping conversion");
            if let Err(e) = verify_fingerprint(&original, &page.fingerprint) {
                info!(error = %e, "stored fingerprint is stale; re-addressing page");
            }
            original.clone()
        };

        let fingerprint = fingerprint_bytes(&canonical);
        let new_key = ContentKey::derive(&fingerprint, PageType::CANONICAL.as_str());

        let _guard = self.locks.lock(number);
        let change = self.update_archive(number, page_number, &old_key, &new_key, converted, &canonical)?;

        page.fingerprint = fingerprint;
        page.page_type = PageType::CANONICAL;

        if let Err(persist_err) = self.documents.update_page(&page) {
            error!(error = %persist_err, "failed to persist preprocessed page; rolling back archive");
            if let Err(rollback_err) = self.roll_back(&page, &old_key, &new_key, change, &original) {
                error!(
                    target: CONSISTENCY_TARGET,
                    document = %number,
                    page = %page_number,
                    old_key = %old_key,
                    new_key = %new_key,
                    operator_action_required = true,
                    error = %rollback_err,
                    "rollback failed; stored content key no longer addresses the page content"
                );
                return Err(PaperwerkError::Inconsistent(format!(
                    "document {number} page {page_number}: expected content at {old_key}, \
                     rollback from {new_key} failed: {rollback_err}"
                )));
            }
            info!("archive rollback successful");
            return Err(persist_err);
        }

        if old_key != new_key && change != ArchiveChange::Moved {
            self.discard_superseded(number, page_number, &old_key);
        }

        debug!(key = %new_key, "preprocessing done");
        Ok(())
    }
}
