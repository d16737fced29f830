// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Paperwerk document engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique, stable identifier of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentNumber(pub u64);

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a page within its document, assigned at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageNumber(pub u32);

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash (lowercase hex SHA-256) of a page or document artifact.
///
/// Empty for records that have never been fingerprinted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key addressing one blob in the content archive: `<fingerprint>.<type>`.
///
/// Always derived from a record's fingerprint and type, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey(String);

impl ContentKey {
    /// Build the key for `fingerprint` and a type name. The type name is
    /// lowercased.
    pub fn derive(fingerprint: &Fingerprint, type_name: &str) -> Self {
        Self(format!("{}.{}", fingerprint, type_name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored enum value that does not match any known variant.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Format of a document's generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    /// No artifact generated yet.
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for DocumentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PDF" => Ok(Self::Pdf),
            "UNKNOWN" | "" => Ok(Self::Unknown),
            other => Err(UnknownVariant {
                kind: "document type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Raw or canonical format of a page's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageType {
    /// Canonical page format produced by the preprocessor.
    Tiff,
    Png,
    Jpeg,
    Gif,
    Bmp,
    Webp,
    Unknown,
}

impl PageType {
    /// The format every page is normalized to.
    pub const CANONICAL: PageType = PageType::Tiff;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Webp => "WEBP",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Infer page type from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => Self::Tiff,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::Webp,
            _ => Self::Unknown,
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == Self::CANONICAL
    }
}

impl FromStr for PageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TIFF" => Ok(Self::Tiff),
            "PNG" => Ok(Self::Png),
            "JPEG" => Ok(Self::Jpeg),
            "GIF" => Ok(Self::Gif),
            "BMP" => Ok(Self::Bmp),
            "WEBP" => Ok(Self::Webp),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(UnknownVariant {
                kind: "page type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Lifecycle states of a document, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentState {
    /// No pages yet.
    Empty,
    /// Has pages, at least one of which is not analyzed.
    Edited,
    /// All pages analyzed.
    Processed,
    /// Reflected in the search index.
    Indexed,
    /// Artifact generated and in sync.
    Archived,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Edited => "EDITED",
            Self::Processed => "PROCESSED",
            Self::Indexed => "INDEXED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMPTY" => Ok(Self::Empty),
            "EDITED" => Ok(Self::Edited),
            "PROCESSED" => Ok(Self::Processed),
            "INDEXED" => Ok(Self::Indexed),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(UnknownVariant {
                kind: "document state",
                value: other.to_owned(),
            }),
        }
    }
}

/// Per-page progress through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PageState {
    /// Just uploaded or modified, raw format.
    Edited,
    /// Normalized to the canonical format and fingerprinted.
    Preprocessed,
    /// Text extracted.
    Analyzed,
    /// Reflected in the search index.
    Indexed,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edited => "EDITED",
            Self::Preprocessed => "PREPROCESSED",
            Self::Analyzed => "ANALYZED",
            Self::Indexed => "INDEXED",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EDITED" => Ok(Self::Edited),
            "PREPROCESSED" => Ok(Self::Preprocessed),
            "ANALYZED" => Ok(Self::Analyzed),
            "INDEXED" => Ok(Self::Indexed),
            other => Err(UnknownVariant {
                kind: "page state",
                value: other.to_owned(),
            }),
        }
    }
}

/// A page of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    /// Parent document (lookup only).
    pub document_number: DocumentNumber,
    pub page_number: PageNumber,
    pub state: PageState,
    pub page_type: PageType,
    pub fingerprint: Fingerprint,
    /// Extracted text, empty until analyzed.
    pub text: String,
    /// Claim flag: set while a stage operation owns this page.
    pub is_in_review: bool,
}

impl DocumentPage {
    /// A freshly uploaded page. The page number is assigned by the store.
    pub fn new(document_number: DocumentNumber, page_type: PageType, fingerprint: Fingerprint) -> Self {
        Self {
            document_number,
            page_number: PageNumber(0),
            state: PageState::Edited,
            page_type,
            fingerprint,
            text: String::new(),
            is_in_review: false,
        }
    }

    /// Key of the blob currently holding this page's content.
    pub fn content_key(&self) -> ContentKey {
        ContentKey::derive(&self.fingerprint, self.page_type.as_str())
    }
}

/// A document managed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_number: DocumentNumber,
    /// Username of the owning user.
    pub owner: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub state: DocumentState,
    /// Only meaningful once the document is indexed or archived.
    pub fingerprint: Fingerprint,
    pub document_type: DocumentType,
    pub pages: Vec<DocumentPage>,
    /// Document-level claim flag held for the duration of a review pass.
    pub is_in_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// A new, empty document. The document number is assigned by the store.
    pub fn new(owner: impl Into<String>, title: impl Into<String>, date: Option<NaiveDate>) -> Self {
        let now = Utc::now();
        Self {
            document_number: DocumentNumber(0),
            owner: owner.into(),
            title: title.into(),
            date,
            state: DocumentState::Empty,
            fingerprint: Fingerprint::empty(),
            document_type: DocumentType::Unknown,
            pages: Vec::new(),
            is_in_review: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key of the document's generated artifact.
    pub fn content_key(&self) -> ContentKey {
        ContentKey::derive(&self.fingerprint, self.document_type.as_str())
    }

    /// Whether every page is in `state`. Vacuously true without pages.
    pub fn are_all_pages_in_state(&self, state: PageState) -> bool {
        self.pages.iter().all(|page| page.state == state)
    }
}

/// Paging information for list and search requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// The request for the page following this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.size,
            size: self.size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { offset: 0, size: 20 }
    }
}

/// A single document matching a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_number: DocumentNumber,
    /// Relevance; higher is better. Zero for match-all queries.
    pub score: f64,
    /// Pages whose text contains at least one query term, in page order.
    #[serde(default)]
    pub pages: Vec<PageNumber>,
}

/// One page of search results plus the total number of matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_in(state: PageState) -> DocumentPage {
        let mut page = DocumentPage::new(DocumentNumber(1), PageType::Png, Fingerprint::empty());
        page.state = state;
        page
    }

    #[test]
    fn document_content_key() {
        let mut document = Document::new("alice", "Invoice", None);
        document.fingerprint = Fingerprint::new("fingerprint");
        document.document_type = DocumentType::Pdf;
        assert_eq!(document.content_key().as_str(), "fingerprint.pdf");
    }

    #[test]
    fn page_content_key() {
        let page = DocumentPage::new(DocumentNumber(7), PageType::Tiff, Fingerprint::new("fingerprint"));
        assert_eq!(page.content_key().as_str(), "fingerprint.tiff");
    }

    #[test]
    fn content_key_follows_fingerprint_changes() {
        let mut page = DocumentPage::new(DocumentNumber(7), PageType::Png, Fingerprint::new("aa"));
        assert_eq!(page.content_key().as_str(), "aa.png");
        page.fingerprint = Fingerprint::new("bb");
        page.page_type = PageType::Tiff;
        assert_eq!(page.content_key().as_str(), "bb.tiff");
    }

    #[test]
    fn all_pages_in_state() {
        let partly = Document {
            pages: vec![page_in(PageState::Edited), page_in(PageState::Analyzed)],
            ..Document::new("alice", "", None)
        };
        let fully = Document {
            pages: vec![page_in(PageState::Analyzed), page_in(PageState::Analyzed)],
            ..Document::new("alice", "", None)
        };
        let empty = Document::new("alice", "", None);

        assert!(!partly.are_all_pages_in_state(PageState::Edited));
        assert!(!partly.are_all_pages_in_state(PageState::Analyzed));
        assert!(!fully.are_all_pages_in_state(PageState::Edited));
        assert!(fully.are_all_pages_in_state(PageState::Analyzed));
        assert!(empty.are_all_pages_in_state(PageState::Analyzed));
        assert!(empty.are_all_pages_in_state(PageState::Edited));
    }

    #[test]
    fn document_states_are_ordered() {
        assert!(DocumentState::Empty < DocumentState::Edited);
        assert!(DocumentState::Edited < DocumentState::Processed);
        assert!(DocumentState::Processed < DocumentState::Indexed);
        assert!(DocumentState::Indexed < DocumentState::Archived);
    }

    #[test]
    fn states_parse_from_storage_strings() {
        for state in [
            DocumentState::Empty,
            DocumentState::Edited,
            DocumentState::Processed,
            DocumentState::Indexed,
            DocumentState::Archived,
        ] {
            assert_eq!(state.as_str().parse::<DocumentState>().unwrap(), state);
        }
        assert!("BOGUS".parse::<PageState>().is_err());
    }

    #[test]
    fn page_type_from_extension_ignores_case() {
        assert_eq!(PageType::from_extension("TIF"), PageType::Tiff);
        assert_eq!(PageType::from_extension("jpeg"), PageType::Jpeg);
        assert_eq!(PageType::from_extension("pdf"), PageType::Unknown);
    }

    #[test]
    fn page_request_next() {
        let pr = PageRequest::new(0, 100);
        assert_eq!(pr.next(), PageRequest::new(100, 100));
    }
}
