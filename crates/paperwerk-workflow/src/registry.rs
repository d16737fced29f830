// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document registry — the workflow state machine.
//
// `review` requests go through a channel to a single review loop, which runs
// one review pass at a time on the blocking pool and coalesces duplicate
// requests that queued up meanwhile. A pass reads fresh state, claims the
// document, and either publishes an index message or claims pages and
// publishes per-page work. Message handlers run the stage, persist the result
// and request another review.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{Span, debug, error, info, info_span, warn};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::{DocumentIndex, Documents, PageAnalyzer, PagePreprocessor};
use paperwerk_core::types::{Document, DocumentNumber, DocumentState, PageNumber, PageState};

use crate::activity::{ActivityGuard, ActivityTracker};
use crate::message::{Mailbox, Message, WorkMessage};
use crate::tube_mail::{Receiver, TubeMail};

/// Stage handlers and stores the registry drives.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn Documents>,
    pub preprocessor: Arc<dyn PagePreprocessor>,
    pub analyzer: Arc<dyn PageAnalyzer>,
    pub index: Arc<dyn DocumentIndex>,
}

/// What a single review pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The document does not exist.
    NotFound,
    /// Another review holds the document claim.
    Busy,
    /// An index message was published.
    Indexing,
    /// Per-page work was published for the claimed pages.
    PagesDispatched {
        preprocess: usize,
        analyze: usize,
        skipped: usize,
    },
    /// Nothing left to do.
    Idle,
    /// The document state has no review rule.
    Unhandled(DocumentState),
    /// The pass could not read or claim the document.
    Failed(String),
}

type ReviewRequest = (DocumentNumber, ActivityGuard);

struct RegistryInner {
    collaborators: Collaborators,
    tube_mail: Arc<TubeMail<WorkMessage>>,
    activity: Arc<ActivityTracker>,
    reviews: mpsc::UnboundedSender<ReviewRequest>,
    span: Span,
}

/// Handle to the workflow engine. Cheap to clone.
#[derive(Clone)]
pub struct DocumentRegistry {
    inner: Arc<RegistryInner>,
}

impl DocumentRegistry {
    /// Build the registry, register its receivers on `tube_mail`, and start
    /// the review loop on the current Tokio runtime.
    ///
    /// All log output of the engine is emitted inside `span`.
    pub fn new(
        collaborators: Collaborators,
        tube_mail: Arc<TubeMail<WorkMessage>>,
        activity: Arc<ActivityTracker>,
        span: Span,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| PaperwerkError::Config(format!("document registry needs a Tokio runtime: {e}")))?;
        let (reviews, queue) = mpsc::unbounded_channel();

        let inner = Arc::new(RegistryInner {
            collaborators,
            tube_mail,
            activity,
            reviews,
            span,
        });

        for mailbox in [Mailbox::DOCUMENT_INDEX, Mailbox::PAGE_PREPROCESS, Mailbox::PAGE_ANALYZE] {
            inner.tube_mail.register_receiver(mailbox, receiver(Arc::downgrade(&inner)));
        }
        runtime.spawn(review_loop(Arc::downgrade(&inner), queue));

        Ok(Self { inner })
    }

    /// Request a review of `number`. Returns immediately; the pass runs on
    /// the review loop and its result is logged.
    pub fn review(&self, number: DocumentNumber) {
        self.inner.review(number);
    }

    /// Run one review pass synchronously on the calling thread.
    pub fn review_pass(&self, number: DocumentNumber) -> ReviewOutcome {
        self.inner.review_pass(number)
    }

    /// Resolve once no review is queued or running and no message is being
    /// handled.
    pub async fn wait_idle(&self) {
        self.inner.activity.idle().await;
    }
}

fn receiver(registry: Weak<RegistryInner>) -> Receiver<WorkMessage> {
    Arc::new(move |message: WorkMessage| -> Result<()> {
        let registry = registry
            .upgrade()
            .ok_or_else(|| PaperwerkError::Config("document registry shut down".into()))?;
        registry.handle(message)
    })
}

async fn review_loop(registry: Weak<RegistryInner>, mut queue: mpsc::UnboundedReceiver<ReviewRequest>) {
    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = queue.try_recv() {
            batch.push(next);
        }

        let mut seen = HashSet::with_capacity(batch.len());
        for (number, guard) in batch {
            if !seen.insert(number) {
                continue;
            }
            let Some(inner) = registry.upgrade() else {
                return;
            };
            match tokio::task::spawn_blocking(move || inner.review_pass(number)).await {
                Ok(outcome) => debug!(document = %number, ?outcome, "review pass finished"),
                Err(e) => error!(document = %number, error = %e, "review pass panicked"),
            }
            drop(guard);
        }
    }
}

impl RegistryInner {
    fn review(&self, number: DocumentNumber) {
        let guard = self.activity.begin();
        if self.reviews.send((number, guard)).is_err() {
            let _span = self.span.enter();
            warn!(document = %number, "review loop stopped; review dropped");
        }
    }

    fn review_pass(&self, number: DocumentNumber) -> ReviewOutcome {
        let _span = info_span!(parent: &self.span, "review", document = %number).entered();
        let documents = &self.collaborators.documents;

        let document = match documents.get_by_document_number(number) {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("document not found; nothing to review");
                return ReviewOutcome::NotFound;
            }
            Err(e) => {
                error!(error = %e, "failed to load document");
                return ReviewOutcome::Failed(e.to_string());
            }
        };

        match documents.try_claim_document(number) {
            Ok(true) => {}
            Ok(false) => {
                info!("document is already in review; skipping");
                return ReviewOutcome::Busy;
            }
            Err(e) => {
                error!(error = %e, "failed to claim document");
                return ReviewOutcome::Failed(e.to_string());
            }
        }

        let outcome = self.dispatch(&document);

        if let Err(e) = documents.release_document(number) {
            error!(error = %e, "failed to release document claim");
        }
        outcome
    }

    fn dispatch(&self, document: &Document) -> ReviewOutcome {
        let number = document.document_number;
        match document.state {
            DocumentState::Empty => {
                debug!("document is empty; indexing");
                self.tube_mail.send_message(WorkMessage::IndexDocument { document: number });
                ReviewOutcome::Indexing
            }
            DocumentState::Edited if document.are_all_pages_in_state(PageState::Analyzed) => {
                debug!("all pages analyzed; indexing");
                self.tube_mail.send_message(WorkMessage::IndexDocument { document: number });
                ReviewOutcome::Indexing
            }
            DocumentState::Edited => {
                debug!(pages = document.pages.len(), "document edited; reviewing pages");
                self.review_pages(document)
            }
            DocumentState::Archived => {
                debug!("document is archived; nothing to do");
                ReviewOutcome::Idle
            }
            state => {
                warn!(%state, "documents in this state are not handled");
                ReviewOutcome::Unhandled(state)
            }
        }
    }

    fn review_pages(&self, document: &Document) -> ReviewOutcome {
        let number = document.document_number;
        let documents = &self.collaborators.documents;
        let (mut preprocess, mut analyze, mut skipped) = (0, 0, 0);

        for page in &document.pages {
            let page_number = page.page_number;
            match documents.try_claim_page(number, page_number) {
                Ok(true) => {}
                Ok(false) => {
                    info!(page = %page_number, "page is already in review; skipping");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(page = %page_number, error = %e, "failed to claim page");
                    skipped += 1;
                    continue;
                }
            }

            // A handler may have advanced the page since the document was read.
            let state = match documents.get_page(number, page_number) {
                Ok(Some(fresh)) => fresh.state,
                Ok(None) => page.state,
                Err(e) => {
                    warn!(page = %page_number, error = %e, "failed to re-read page; using state from review start");
                    page.state
                }
            };

            match state {
                PageState::Edited => {
                    debug!(page = %page_number, "page modified; sending to preprocessing");
                    self.tube_mail.send_message(WorkMessage::PreprocessPage {
                        document: number,
                        page: page_number,
                    });
                    preprocess += 1;
                }
                PageState::Preprocessed => {
                    debug!(page = %page_number, "page preprocessed; sending to analysis");
                    self.tube_mail.send_message(WorkMessage::AnalyzePage {
                        document: number,
                        page: page_number,
                    });
                    analyze += 1;
                }
                other => {
                    if other != PageState::Analyzed {
                        warn!(page = %page_number, state = %other, "pages in this state are not handled");
                    }
                    if let Err(e) = self.finish_page_review(number, page_number, other) {
                        error!(page = %page_number, error = %e, "failed to finish page review");
                    }
                    skipped += 1;
                }
            }
        }

        ReviewOutcome::PagesDispatched {
            preprocess,
            analyze,
            skipped,
        }
    }

    // -- Message handlers -----------------------------------------------------

    fn handle(&self, message: WorkMessage) -> Result<()> {
        let _span = info_span!(
            parent: &self.span,
            "handle",
            mailbox = %message.mailbox(),
            document = %message.document()
        )
        .entered();
        info!(?message, "handling work message");
        match message {
            WorkMessage::IndexDocument { document } => self.index_document(document),
            WorkMessage::PreprocessPage { document, page } => self.preprocess_page(document, page),
            WorkMessage::AnalyzePage { document, page } => self.analyze_page(document, page),
        }
    }

    fn index_document(&self, number: DocumentNumber) -> Result<()> {
        self.collaborators.index.index_document(number)?;

        let documents = &self.collaborators.documents;
        let mut document = documents
            .get_by_document_number(number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number}")))?;

        if !document.are_all_pages_in_state(PageState::Analyzed) {
            info!(document = %number, "document changed while indexing; not marking indexed");
        } else {
            document.state = DocumentState::Indexed;
            documents.update(&document)?;
            info!(document = %number, "document indexed");

            // An upload that landed between the read and the write above
            // must not be hidden behind the Indexed state.
            if let Some(mut current) = documents.get_by_document_number(number)? {
                if !current.are_all_pages_in_state(PageState::Analyzed) {
                    current.state = DocumentState::Edited;
                    documents.update(&current)?;
                    info!(document = %number, pages = current.pages.len(), "pages added while indexing; reopened");
                }
            }
        }

        self.review(number);
        Ok(())
    }

    fn preprocess_page(&self, number: DocumentNumber, page: PageNumber) -> Result<()> {
        if let Err(e) = self.collaborators.preprocessor.preprocess_page(number, page) {
            self.release_page(number, page);
            return Err(e);
        }
        if let Err(e) = self.finish_page_review(number, page, PageState::Preprocessed) {
            self.release_page(number, page);
            return Err(e);
        }
        self.review(number);
        Ok(())
    }

    fn analyze_page(&self, number: DocumentNumber, page_number: PageNumber) -> Result<()> {
        let text = match self.collaborators.analyzer.scan_page(number, page_number) {
            Ok(text) => text,
            Err(e) => {
                self.release_page(number, page_number);
                return Err(e);
            }
        };

        let documents = &self.collaborators.documents;
        let stored = documents.get_page(number, page_number).and_then(|page| {
            let mut page =
                page.ok_or_else(|| PaperwerkError::NotFound(format!("document {number} page {page_number}")))?;
            page.text = text;
            page.state = PageState::Analyzed;
            page.is_in_review = false;
            documents.update_page(&page)
        });
        if let Err(e) = stored {
            self.release_page(number, page_number);
            return Err(e);
        }

        debug!(document = %number, page = %page_number, "page analyzed");
        self.review(number);
        Ok(())
    }

    // -- Claim helpers --------------------------------------------------------

    /// Clear the page claim and set `state`.
    fn finish_page_review(&self, number: DocumentNumber, page_number: PageNumber, state: PageState) -> Result<()> {
        let documents = &self.collaborators.documents;
        let mut page = documents
            .get_page(number, page_number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number} page {page_number}")))?;
        page.state = state;
        page.is_in_review = false;
        documents.update_page(&page)
    }

    /// Clear the page claim, leaving its state as is, so a later review
    /// retries the stage.
    fn release_page(&self, number: DocumentNumber, page_number: PageNumber) {
        let documents = &self.collaborators.documents;
        let released = documents.get_page(number, page_number).and_then(|page| match page {
            Some(mut page) => {
                page.is_in_review = false;
                documents.update_page(&page)
            }
            None => Ok(()),
        });
        if let Err(e) = released {
            error!(document = %number, page = %page_number, error = %e, "failed to release page claim");
        }
    }
}
