// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document intake — creating documents and uploading pages into the archive.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::fingerprint::fingerprint_bytes;
use paperwerk_core::locks::ArchiveLocks;
use paperwerk_core::traits::{DocumentArchive, Documents};
use paperwerk_core::types::{Document, DocumentNumber, DocumentPage, DocumentState, PageNumber, PageType};

use crate::registry::DocumentRegistry;

/// Entry point for new content. Every change requests a review so the
/// workflow picks it up.
pub struct DocumentIntake {
    documents: Arc<dyn Documents>,
    archive: Arc<dyn DocumentArchive>,
    locks: Arc<ArchiveLocks>,
    registry: DocumentRegistry,
}

impl DocumentIntake {
    /// `locks` must be the instance the page preprocessor uses.
    pub fn new(
        documents: Arc<dyn Documents>,
        archive: Arc<dyn DocumentArchive>,
        locks: Arc<ArchiveLocks>,
        registry: DocumentRegistry,
    ) -> Self {
        Self {
            documents,
            archive,
            locks,
            registry,
        }
    }

    /// Create an empty document.
    #[instrument(skip(self))]
    pub fn create_document(&self, owner: &str, title: &str, date: Option<NaiveDate>) -> Result<DocumentNumber> {
        let number = self.documents.add(&Document::new(owner, title, date))?;
        info!(document = %number, "document created");
        self.registry.review(number);
        Ok(number)
    }

    /// Store `content` as the next page of `number` and mark the document
    /// edited. The raw upload is fingerprinted before it reaches the archive.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub fn append_page(&self, number: DocumentNumber, content: &[u8], page_type: PageType) -> Result<PageNumber> {
        let mut document = self
            .documents
            .get_by_document_number(number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number}")))?;
        if content.is_empty() {
            return Err(PaperwerkError::Conversion("page upload is empty".into()));
        }

        let page = DocumentPage::new(number, page_type, fingerprint_bytes(content));
        let key = page.content_key();
        let page_number = {
            // A blob found here must still exist once the page references it.
            let _guard = self.locks.lock(number);
            if !self.archive.content_exists(number, &key)? {
                self.archive.store_content(number, &key, content)?;
            }
            self.documents.add_page(&page)?
        };

        // Written unconditionally: an index handler may have marked the
        // document Indexed since it was read.
        document.state = DocumentState::Edited;
        self.documents.update(&document)?;

        info!(document = %number, page = %page_number, %key, "page uploaded");
        self.registry.review(number);
        Ok(page_number)
    }

    /// Archived bytes of one page, in whatever form the workflow has left
    /// them.
    pub fn page_content(&self, number: DocumentNumber, page_number: PageNumber) -> Result<Vec<u8>> {
        let page = self
            .documents
            .get_page(number, page_number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number} page {page_number}")))?;
        self.archive.read_content(number, &page.content_key())
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use paperwerk_core::traits::{DocumentIndex, PageAnalyzer, PagePreprocessor};
    use paperwerk_core::types::PageState;
    use paperwerk_document::{ImagePreprocessor, ImageProcessor, PageScanner, TextRecognizer};
    use paperwerk_storage::{FileSystemArchive, SqliteDocumentIndex, SqliteDocuments};
    use tokio::runtime::Handle;
    use tracing::Span;

    use crate::activity::ActivityTracker;
    use crate::registry::Collaborators;
    use crate::tube_mail::TubeMail;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, content: &[u8]) -> Result<String> {
            ImageProcessor::from_bytes(content)?;
            Ok(self.0.to_string())
        }
    }

    struct Setup {
        _dir: tempfile::TempDir,
        documents: Arc<SqliteDocuments>,
        index: Arc<SqliteDocumentIndex>,
        intake: DocumentIntake,
    }

    fn setup() -> Setup {
        let dir = tempfile::tempdir().expect("tempdir");
        let documents = Arc::new(SqliteDocuments::open_in_memory().expect("store"));
        let archive: Arc<dyn DocumentArchive> = Arc::new(FileSystemArchive::new(dir.path()).expect("archive"));
        let index = Arc::new(SqliteDocumentIndex::open_in_memory(documents.clone(), 50).expect("index"));
        let locks = ArchiveLocks::new();
        let preprocessor: Arc<dyn PagePreprocessor> =
            Arc::new(ImagePreprocessor::new(documents.clone(), archive.clone(), locks.clone()));
        let analyzer: Arc<dyn PageAnalyzer> = Arc::new(PageScanner::new(
            documents.clone(),
            archive.clone(),
            FixedText("invoice number 4711"),
        ));
        let index_dyn: Arc<dyn DocumentIndex> = index.clone();

        let activity = ActivityTracker::new();
        let tube_mail = Arc::new(TubeMail::new(Handle::current(), activity.clone()));
        let registry = DocumentRegistry::new(
            Collaborators {
                documents: documents.clone(),
                preprocessor,
                analyzer,
                index: index_dyn,
            },
            tube_mail,
            activity,
            Span::none(),
        )
        .expect("registry");

        let intake = DocumentIntake::new(documents.clone(), archive, locks, registry);
        Setup {
            _dir: dir,
            documents,
            index,
            intake,
        }
    }

    fn png_page(shade: u8) -> Vec<u8> {
        ImageProcessor::from_dynamic(image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            16,
            16,
            image::Luma([shade]),
        )))
        .to_png_bytes()
        .expect("png")
    }

    async fn settle(intake: &DocumentIntake) {
        tokio::time::timeout(Duration::from_secs(10), intake.registry().wait_idle())
            .await
            .expect("engine settled");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_document_is_indexed_while_empty() {
        let s = setup();
        let number = s.intake.create_document("alice", "tax 2025", None).expect("create");
        settle(&s.intake).await;

        let document = s.documents.get_by_document_number(number).expect("get").expect("doc");
        assert_eq!(document.state, DocumentState::Indexed);
        assert_eq!(s.index.search("tax", Default::default()).expect("search").total, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uploaded_pages_flow_to_indexed() {
        let s = setup();
        let number = s.intake.create_document("alice", "invoice", None).expect("create");
        settle(&s.intake).await;

        let first = s.intake.append_page(number, &png_page(240), PageType::Png).expect("page 0");
        let second = s.intake.append_page(number, &png_page(10), PageType::Png).expect("page 1");
        assert_eq!((first, second), (PageNumber(0), PageNumber(1)));
        settle(&s.intake).await;

        let document = s.documents.get_by_document_number(number).expect("get").expect("doc");
        assert_eq!(document.state, DocumentState::Indexed);
        assert!(document.are_all_pages_in_state(PageState::Analyzed));
        assert!(document.pages.iter().all(|p| p.page_type == PageType::Tiff));

        let stored = s.intake.page_content(number, first).expect("content");
        assert_eq!(fingerprint_bytes(&stored), document.pages[0].fingerprint);

        let hits = s.index.search("4711", Default::default()).expect("search");
        assert_eq!(hits.hits.len(), 1);
        assert_eq!(hits.hits[0].document_number, number);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn identical_pages_uploaded_back_to_back_are_all_analyzed() {
        let s = setup();
        let number = s.intake.create_document("erin", "duplicates", None).expect("create");
        let scan = png_page(128);
        for _ in 0..4 {
            s.intake.append_page(number, &scan, PageType::Png).expect("page");
        }
        settle(&s.intake).await;

        let document = s.documents.get_by_document_number(number).expect("get").expect("doc");
        assert_eq!(document.pages.len(), 4);
        assert!(document.are_all_pages_in_state(PageState::Analyzed));
        assert_eq!(document.state, DocumentState::Indexed);
        for page in &document.pages {
            s.intake.page_content(number, page.page_number).expect("content readable");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn appending_to_indexed_document_reopens_it() {
        let s = setup();
        let number = s.intake.create_document("bob", "letters", None).expect("create");
        s.intake.append_page(number, &png_page(200), PageType::Png).expect("page");
        settle(&s.intake).await;
        assert_eq!(
            s.documents.get_by_document_number(number).expect("get").expect("doc").state,
            DocumentState::Indexed
        );

        s.intake.append_page(number, &png_page(50), PageType::Png).expect("page");
        settle(&s.intake).await;

        let document = s.documents.get_by_document_number(number).expect("get").expect("doc");
        assert_eq!(document.pages.len(), 2);
        assert!(document.are_all_pages_in_state(PageState::Analyzed));
        assert_eq!(document.state, DocumentState::Indexed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_to_missing_document_fails() {
        let s = setup();
        let err = s
            .intake
            .append_page(DocumentNumber(42), &png_page(1), PageType::Png)
            .unwrap_err();
        assert!(matches!(err, PaperwerkError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_upload_is_rejected() {
        let s = setup();
        let number = s.intake.create_document("carol", "blank", None).expect("create");
        let err = s.intake.append_page(number, &[], PageType::Png).unwrap_err();
        assert!(matches!(err, PaperwerkError::Conversion(_)));
        settle(&s.intake).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_page_content_is_not_found() {
        let s = setup();
        let number = s.intake.create_document("dave", "nothing", None).expect("create");
        let err = s.intake.page_content(number, PageNumber(0)).unwrap_err();
        assert!(matches!(err, PaperwerkError::NotFound(_)));
        settle(&s.intake).await;
    }
}
