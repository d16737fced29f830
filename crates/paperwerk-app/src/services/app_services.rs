// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens the stores, wires the stage handlers to the
// workflow engine, and exposes the operations the CLI runs.
//
// Store and index calls are synchronous SQLite work, so the async methods
// move them onto the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tracing::{Span, error, info, info_span, warn};

use paperwerk_core::{ArchiveLocks, EngineConfig};
use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::{DocumentIndex, Documents, PageAnalyzer};
use paperwerk_core::types::{Document, DocumentNumber, PageRequest, PageType, SearchResults};
use paperwerk_document::{ImagePreprocessor, PageScanner};
#[cfg(not(feature = "ocr"))]
use paperwerk_document::TesseractRecognizer;
use paperwerk_storage::{FileSystemArchive, SqliteDocumentIndex, SqliteDocuments};
use paperwerk_workflow::{ActivityTracker, Collaborators, DocumentIntake, DocumentRegistry, TubeMail};

/// Everything the CLI needs, wired once at start-up.
#[derive(Clone)]
pub struct AppServices {
    config: Arc<EngineConfig>,
    documents: Arc<SqliteDocuments>,
    index: Arc<SqliteDocumentIndex>,
    intake: Arc<DocumentIntake>,
    registry: DocumentRegistry,
    activity: Arc<ActivityTracker>,
}

impl AppServices {
    /// Open the stores under `config.data_dir` and start the engine. Must be
    /// called inside a Tokio runtime.
    ///
    /// Review claims left over from a previous run are cleared, and a freshly
    /// created index is filled from the store in the background.
    pub fn init(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| PaperwerkError::Config(format!("services need a Tokio runtime: {e}")))?;
        info!(path = %config.data_dir.display(), "initialising app services");

        std::fs::create_dir_all(&config.data_dir)?;
        let documents = Arc::new(SqliteDocuments::open(config.database_path())?);
        let archive = Arc::new(FileSystemArchive::new(config.archive_path())?);
        let index = Arc::new(SqliteDocumentIndex::open(
            config.index_path(),
            documents.clone(),
            config.index_batch_size,
        )?);

        let released = documents.reset_review_claims()?;
        if released > 0 {
            warn!(released, "cleared review claims left by an earlier run");
        }

        let activity = ActivityTracker::new();
        let tube_mail = Arc::new(TubeMail::new(runtime.clone(), activity.clone()));
        let span = info_span!("paperwerk", data_dir = %config.data_dir.display());
        let locks = ArchiveLocks::new();
        let registry = DocumentRegistry::new(
            Collaborators {
                documents: documents.clone(),
                preprocessor: Arc::new(ImagePreprocessor::new(documents.clone(), archive.clone(), locks.clone())),
                analyzer: analyzer(&config, documents.clone(), archive.clone())?,
                index: index.clone(),
            },
            tube_mail,
            activity.clone(),
            span.clone(),
        )?;
        let intake = Arc::new(DocumentIntake::new(documents.clone(), archive, locks, registry.clone()));

        if index.was_created() {
            spawn_reindex(&runtime, index.clone(), &activity, span);
        }

        info!("app services initialised");
        Ok(Self {
            config: Arc::new(config),
            documents,
            index,
            intake,
            registry,
            activity,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Intake --------------------------------------------------------------

    /// Create a document from `files`, one page per file, in order. Page
    /// types come from the file extensions.
    pub async fn ingest(
        &self,
        owner: String,
        title: String,
        date: Option<NaiveDate>,
        files: Vec<PathBuf>,
    ) -> Result<DocumentNumber> {
        let intake = self.intake.clone();
        blocking(move || {
            let mut pages = Vec::with_capacity(files.len());
            for path in &files {
                let page_type = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(PageType::Unknown, PageType::from_extension);
                let content = std::fs::read(path)?;
                pages.push((path, content, page_type));
            }

            let number = intake.create_document(&owner, &title, date)?;
            for (path, content, page_type) in pages {
                let page = intake.append_page(number, &content, page_type)?;
                info!(document = %number, page = %page, file = %path.display(), "page ingested");
            }
            Ok(number)
        })
        .await
    }

    // -- Workflow ------------------------------------------------------------

    /// Request a review of each document. With no numbers, every stored
    /// document is reviewed.
    pub async fn review(&self, numbers: Vec<DocumentNumber>) -> Result<usize> {
        let numbers = if numbers.is_empty() {
            let documents = self.documents.clone();
            blocking(move || all_document_numbers(documents.as_ref())).await?
        } else {
            numbers
        };
        for number in &numbers {
            self.registry.review(*number);
        }
        Ok(numbers.len())
    }

    /// Resolve once the engine has nothing queued or running.
    pub async fn wait_idle(&self) {
        self.activity.idle().await;
    }

    // -- Queries -------------------------------------------------------------

    pub async fn show(&self, number: DocumentNumber) -> Result<Document> {
        let documents = self.documents.clone();
        blocking(move || {
            documents
                .get_by_document_number(number)?
                .ok_or_else(|| PaperwerkError::NotFound(format!("document {number}")))
        })
        .await
    }

    pub async fn search(&self, query: String, page: PageRequest) -> Result<SearchResults> {
        let index = self.index.clone();
        blocking(move || index.search(&query, page)).await
    }

    /// Rebuild the search index from the store.
    pub async fn reindex(&self) -> Result<u64> {
        let index = self.index.clone();
        blocking(move || index.index_all_documents()).await
    }
}

fn analyzer(
    config: &EngineConfig,
    documents: Arc<SqliteDocuments>,
    archive: Arc<FileSystemArchive>,
) -> Result<Arc<dyn PageAnalyzer>> {
    #[cfg(feature = "ocr")]
    let recognizer = paperwerk_document::OcrsRecognizer::from_model_dir(config.ocr_model_dir.as_deref())?;
    #[cfg(not(feature = "ocr"))]
    let recognizer = TesseractRecognizer::new(&config.tesseract_executable, &config.ocr_languages);

    Ok(Arc::new(PageScanner::new(documents, archive, recognizer)))
}

fn spawn_reindex(runtime: &Handle, index: Arc<SqliteDocumentIndex>, activity: &Arc<ActivityTracker>, span: Span) {
    let guard = activity.begin();
    runtime.spawn_blocking(move || {
        let _guard = guard;
        let _span = span.entered();
        info!("search index is new; indexing all documents");
        match index.index_all_documents() {
            Ok(count) => info!(count, "initial indexing finished"),
            Err(e) => error!(error = %e, "initial indexing failed"),
        }
    });
}

fn all_document_numbers(documents: &dyn Documents) -> Result<Vec<DocumentNumber>> {
    let mut numbers = Vec::new();
    let mut page = PageRequest::default();
    loop {
        let batch = documents.find(page)?;
        if batch.is_empty() {
            return Ok(numbers);
        }
        numbers.extend(batch.iter().map(|d| d.document_number));
        page = page.next();
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PaperwerkError::Config(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use paperwerk_core::types::DocumentState;

    fn config_in(dir: &std::path::Path) -> EngineConfig {
        let mut config = EngineConfig::with_data_dir(dir);
        // No recognizer runs in these tests; pages stay short of analysis.
        config.tesseract_executable = "paperwerk-test-missing-tesseract".into();
        config
    }

    async fn settle(services: &AppServices) {
        tokio::time::timeout(Duration::from_secs(10), services.wait_idle())
            .await
            .expect("engine settled");
    }

    fn write_png(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::GrayImage::from_pixel(8, 8, image::Luma([128]))
            .save(&path)
            .expect("png");
        path
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init_creates_stores_under_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::init(config_in(dir.path())).expect("init");
        settle(&services).await;

        assert!(dir.path().join("paperwerk.db").exists());
        assert!(dir.path().join("index.db").exists());
        assert!(dir.path().join("archive").is_dir());
        assert_eq!(services.config().index_batch_size, 100);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.index_batch_size = 0;
        assert!(matches!(AppServices::init(config), Err(PaperwerkError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ingest_preprocesses_pages_without_a_recognizer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = tempfile::tempdir().expect("uploads");
        let services = AppServices::init(config_in(dir.path())).expect("init");

        let files = vec![write_png(uploads.path(), "a.png"), write_png(uploads.path(), "b.png")];
        let number = services
            .ingest("alice".into(), "scans".into(), None, files)
            .await
            .expect("ingest");
        settle(&services).await;

        let document = services.show(number).await.expect("show");
        assert_eq!(document.pages.len(), 2);
        // Analysis fails without Tesseract, so the document waits in Edited.
        assert_eq!(document.state, DocumentState::Edited);
        assert!(document.pages.iter().all(|p| p.page_type == PageType::Tiff));
        assert!(document.pages.iter().all(|p| !p.is_in_review));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ingest_of_missing_file_creates_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::init(config_in(dir.path())).expect("init");

        let err = services
            .ingest("alice".into(), "ghost".into(), None, vec![dir.path().join("nope.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, PaperwerkError::Io(_)));
        assert_eq!(services.review(Vec::new()).await.expect("review"), 0);
        settle(&services).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reopened_store_reindexes_and_searches() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let services = AppServices::init(config_in(dir.path())).expect("init");
            services
                .ingest("alice".into(), "quarterly report".into(), None, Vec::new())
                .await
                .expect("ingest");
            settle(&services).await;
        }

        std::fs::remove_file(dir.path().join("index.db")).expect("drop index");
        for leftover in ["index.db-wal", "index.db-shm"] {
            let _ = std::fs::remove_file(dir.path().join(leftover));
        }
        let services = AppServices::init(config_in(dir.path())).expect("reinit");
        settle(&services).await;

        let hits = services
            .search("quarterly".into(), PageRequest::default())
            .await
            .expect("search");
        assert_eq!(hits.total, 1);
        assert_eq!(services.reindex().await.expect("reindex"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn show_unknown_document_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::init(config_in(dir.path())).expect("init");
        let err = services.show(DocumentNumber(77)).await.unwrap_err();
        assert!(matches!(err, PaperwerkError::NotFound(_)));
        settle(&services).await;
    }
}
