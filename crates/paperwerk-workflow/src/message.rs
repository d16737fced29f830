// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed work messages and the mailboxes they are addressed to.

use std::fmt;

use paperwerk_core::types::{DocumentNumber, PageNumber};

/// Name of a tube mail mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mailbox(&'static str);

impl Mailbox {
    pub const DOCUMENT_INDEX: Mailbox = Mailbox("document.index");
    pub const PAGE_PREPROCESS: Mailbox = Mailbox("document.page.preprocess");
    pub const PAGE_ANALYZE: Mailbox = Mailbox("document.page.analyze");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A message that knows which mailbox it is addressed to.
pub trait Message: Clone + fmt::Debug + Send + 'static {
    fn mailbox(&self) -> Mailbox;
}

/// Work the registry hands to stage handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkMessage {
    IndexDocument {
        document: DocumentNumber,
    },
    PreprocessPage {
        document: DocumentNumber,
        page: PageNumber,
    },
    AnalyzePage {
        document: DocumentNumber,
        page: PageNumber,
    },
}

impl WorkMessage {
    pub fn document(&self) -> DocumentNumber {
        match *self {
            Self::IndexDocument { document }
            | Self::PreprocessPage { document, .. }
            | Self::AnalyzePage { document, .. } => document,
        }
    }
}

impl Message for WorkMessage {
    fn mailbox(&self) -> Mailbox {
        match self {
            Self::IndexDocument { .. } => Mailbox::DOCUMENT_INDEX,
            Self::PreprocessPage { .. } => Mailbox::PAGE_PREPROCESS,
            Self::AnalyzePage { .. } => Mailbox::PAGE_ANALYZE,
        }
    }
}
