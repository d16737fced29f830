// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page analyzer — reads a preprocessed page from the archive and runs a text
// recognizer over it.

use std::sync::Arc;

use tracing::{debug, instrument};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::{DocumentArchive, Documents, PageAnalyzer};
use paperwerk_core::types::{DocumentNumber, PageNumber};

/// Turns encoded page image bytes into text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, content: &[u8]) -> Result<String>;
}

/// [`PageAnalyzer`] backed by any [`TextRecognizer`].
pub struct PageScanner<R> {
    documents: Arc<dyn Documents>,
    archive: Arc<dyn DocumentArchive>,
    recognizer: R,
}

impl<R: TextRecognizer> PageScanner<R> {
    pub fn new(documents: Arc<dyn Documents>, archive: Arc<dyn DocumentArchive>, recognizer: R) -> Self {
        Self {
            documents,
            archive,
            recognizer,
        }
    }
}

impl<R: TextRecognizer> PageAnalyzer for PageScanner<R> {
    #[instrument(skip(self), fields(document = %number, page = %page_number))]
    fn scan_page(&self, number: DocumentNumber, page_number: PageNumber) -> Result<String> {
        let page = self
            .documents
            .get_page(number, page_number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number} page {page_number}")))?;
        let content = self.archive.read_content(number, &page.content_key())?;

        let text = self.recognizer.recognize(&content).map_err(|e| {
            PaperwerkError::Analysis(format!(
                "scanning failed for document {number} page {page_number}: {e}"
            ))
        })?;
        let text = text.trim_end().to_owned();

        if text.is_empty() {
            debug!("no text recognized; treating page as blank");
        } else {
            debug!(chars = text.chars().count(), "page scanned");
        }
        Ok(text)
    }
}
