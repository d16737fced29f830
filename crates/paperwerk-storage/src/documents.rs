// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document entity store backed by SQLite.
//
// Documents and pages live in two tables. States and types are stored as
// their upper-case names. Review claims are plain integer flags that are only
// ever set through conditional updates, so two concurrent reviews can never
// both own the same page.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument, warn};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::Documents;
use paperwerk_core::types::{
    Document, DocumentNumber, DocumentPage, Fingerprint, PageNumber, PageRequest,
};

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        document_number INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        title TEXT NOT NULL,
        date TEXT,
        state TEXT NOT NULL,
        fingerprint TEXT NOT NULL DEFAULT '',
        document_type TEXT NOT NULL,
        is_in_review INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS pages (
        document_number INTEGER NOT NULL REFERENCES documents(document_number) ON DELETE CASCADE,
        page_number INTEGER NOT NULL,
        state TEXT NOT NULL,
        page_type TEXT NOT NULL,
        fingerprint TEXT NOT NULL DEFAULT '',
        text TEXT NOT NULL DEFAULT '',
        is_in_review INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (document_number, page_number)
    );
"#;

const DOCUMENT_COLUMNS: &str = "document_number, owner, title, date, state, fingerprint, \
     document_type, is_in_review, created_at, updated_at";

const PAGE_COLUMNS: &str =
    "document_number, page_number, state, page_type, fingerprint, text, is_in_review";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn db_err(e: rusqlite::Error) -> PaperwerkError {
    PaperwerkError::Database(e.to_string())
}

/// SQLite-backed [`Documents`] implementation.
///
/// The connection is guarded by a mutex; every trait method holds it for the
/// duration of one statement or transaction.
pub struct SqliteDocuments {
    conn: Mutex<Connection>,
}

impl SqliteDocuments {
    /// Open (or create) the entity store at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PaperwerkError::Database(format!("WAL pragma: {e}")))?;
        Self::init(conn, "entity store opened")
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, "in-memory entity store opened")
    }

    fn init(conn: Connection, message: &str) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_err)?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| PaperwerkError::Database(format!("create tables: {e}")))?;
        info!("{message}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PaperwerkError::Database("entity store connection poisoned".into()))
    }

    fn load_pages(conn: &Connection, number: DocumentNumber) -> Result<Vec<DocumentPage>> {
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE document_number = ?1 ORDER BY page_number"
            ))
            .map_err(db_err)?;
        stmt.query_map(params![number.0 as i64], row_to_page)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PaperwerkError::Database(format!("collect pages: {e}")))
    }
}

impl Documents for SqliteDocuments {
    #[instrument(skip(self), fields(document = %number))]
    fn get_by_document_number(&self, number: DocumentNumber) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_number = ?1"),
                params![number.0 as i64],
                row_to_document,
            )
            .optional()
            .map_err(db_err)?;

        match document {
            Some(mut document) => {
                document.pages = Self::load_pages(&conn, number)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    fn find(&self, page: PageRequest) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 ORDER BY document_number LIMIT ?1 OFFSET ?2"
            ))
            .map_err(db_err)?;
        let mut documents = stmt
            .query_map(params![page.size as i64, page.offset as i64], row_to_document)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PaperwerkError::Database(format!("collect documents: {e}")))?;

        for document in &mut documents {
            document.pages = Self::load_pages(&conn, document.document_number)?;
        }

        debug!(count = documents.len(), "documents loaded");
        Ok(documents)
    }

    #[instrument(skip(self, document), fields(owner = %document.owner))]
    fn add(&self, document: &Document) -> Result<DocumentNumber> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (owner, title, date, state, fingerprint, document_type,
                                    is_in_review, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
            params![
                document.owner,
                document.title,
                document.date.map(|d| d.format(DATE_FORMAT).to_string()),
                document.state.as_str(),
                document.fingerprint.as_str(),
                document.document_type.as_str(),
                document.created_at.to_rfc3339(),
                document.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| PaperwerkError::Database(format!("insert document: {e}")))?;

        let number = DocumentNumber(conn.last_insert_rowid() as u64);
        info!(document = %number, "document added");
        Ok(number)
    }

    #[instrument(skip(self, document), fields(document = %document.document_number))]
    fn update(&self, document: &Document) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE documents
                 SET owner = ?1, title = ?2, date = ?3, state = ?4, fingerprint = ?5,
                     document_type = ?6, updated_at = ?7
                 WHERE document_number = ?8",
                params![
                    document.owner,
                    document.title,
                    document.date.map(|d| d.format(DATE_FORMAT).to_string()),
                    document.state.as_str(),
                    document.fingerprint.as_str(),
                    document.document_type.as_str(),
                    Utc::now().to_rfc3339(),
                    document.document_number.0 as i64,
                ],
            )
            .map_err(|e| PaperwerkError::Database(format!("update document: {e}")))?;

        if rows == 0 {
            return Err(PaperwerkError::NotFound(format!(
                "document {}",
                document.document_number
            )));
        }
        debug!(state = %document.state, "document updated");
        Ok(())
    }

    #[instrument(skip(self), fields(document = %number, page = %page))]
    fn get_page(&self, number: DocumentNumber, page: PageNumber) -> Result<Option<DocumentPage>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE document_number = ?1 AND page_number = ?2"
            ),
            params![number.0 as i64, page.0 as i64],
            row_to_page,
        )
        .optional()
        .map_err(db_err)
    }

    #[instrument(skip(self, page), fields(document = %page.document_number))]
    fn add_page(&self, page: &DocumentPage) -> Result<PageNumber> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE document_number = ?1)",
                params![page.document_number.0 as i64],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if !exists {
            return Err(PaperwerkError::NotFound(format!(
                "document {}",
                page.document_number
            )));
        }

        let count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE document_number = ?1",
                params![page.document_number.0 as i64],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let page_number = PageNumber(count as u32);

        tx.execute(
            "INSERT INTO pages (document_number, page_number, state, page_type, fingerprint,
                                text, is_in_review)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                page.document_number.0 as i64,
                page_number.0 as i64,
                page.state.as_str(),
                page.page_type.as_str(),
                page.fingerprint.as_str(),
                page.text,
            ],
        )
        .map_err(|e| PaperwerkError::Database(format!("insert page: {e}")))?;
        tx.commit().map_err(db_err)?;

        info!(page = %page_number, "page added");
        Ok(page_number)
    }

    #[instrument(skip(self, page), fields(document = %page.document_number, page = %page.page_number))]
    fn update_page(&self, page: &DocumentPage) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE pages
                 SET state = ?1, page_type = ?2, fingerprint = ?3, text = ?4, is_in_review = ?5
                 WHERE document_number = ?6 AND page_number = ?7",
                params![
                    page.state.as_str(),
                    page.page_type.as_str(),
                    page.fingerprint.as_str(),
                    page.text,
                    page.is_in_review,
                    page.document_number.0 as i64,
                    page.page_number.0 as i64,
                ],
            )
            .map_err(|e| PaperwerkError::Database(format!("update page: {e}")))?;

        if rows == 0 {
            return Err(PaperwerkError::NotFound(format!(
                "document {} page {}",
                page.document_number, page.page_number
            )));
        }
        debug!(state = %page.state, "page updated");
        Ok(())
    }

    #[instrument(skip(self), fields(document = %number, page = %page))]
    fn try_claim_page(&self, number: DocumentNumber, page: PageNumber) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE pages SET is_in_review = 1
                 WHERE document_number = ?1 AND page_number = ?2 AND is_in_review = 0",
                params![number.0 as i64, page.0 as i64],
            )
            .map_err(|e| PaperwerkError::Database(format!("claim page: {e}")))?;
        Ok(rows == 1)
    }

    #[instrument(skip(self), fields(document = %number))]
    fn try_claim_document(&self, number: DocumentNumber) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE documents SET is_in_review = 1
                 WHERE document_number = ?1 AND is_in_review = 0",
                params![number.0 as i64],
            )
            .map_err(|e| PaperwerkError::Database(format!("claim document: {e}")))?;
        Ok(rows == 1)
    }

    #[instrument(skip(self), fields(document = %number))]
    fn release_document(&self, number: DocumentNumber) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE documents SET is_in_review = 0 WHERE document_number = ?1",
            params![number.0 as i64],
        )
        .map_err(|e| PaperwerkError::Database(format!("release document: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn reset_review_claims(&self) -> Result<u64> {
        let conn = self.lock()?;
        let documents = conn
            .execute("UPDATE documents SET is_in_review = 0 WHERE is_in_review = 1", [])
            .map_err(db_err)?;
        let pages = conn
            .execute("UPDATE pages SET is_in_review = 0 WHERE is_in_review = 1", [])
            .map_err(db_err)?;

        let released = (documents + pages) as u64;
        if released > 0 {
            warn!(documents, pages, "released stale review claims");
        }
        Ok(released)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_err(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(column, e))
}

/// Column order follows `DOCUMENT_COLUMNS`.
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let number: i64 = row.get(0)?;
    let date: Option<String> = row.get(3)?;
    let state: String = row.get(4)?;
    let fingerprint: String = row.get(5)?;
    let document_type: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    let date = date
        .map(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT))
        .transpose()
        .map_err(|e| conversion_err(3, e))?;

    Ok(Document {
        document_number: DocumentNumber(number as u64),
        owner: row.get(1)?,
        title: row.get(2)?,
        date,
        state: state.parse().map_err(|e| conversion_err(4, e))?,
        fingerprint: Fingerprint::new(fingerprint),
        document_type: document_type.parse().map_err(|e| conversion_err(6, e))?,
        pages: Vec::new(),
        is_in_review: row.get(7)?,
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
    })
}

/// Column order follows `PAGE_COLUMNS`.
fn row_to_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentPage> {
    let number: i64 = row.get(0)?;
    let page_number: i64 = row.get(1)?;
    let state: String = row.get(2)?;
    let page_type: String = row.get(3)?;
    let fingerprint: String = row.get(4)?;

    Ok(DocumentPage {
        document_number: DocumentNumber(number as u64),
        page_number: PageNumber(page_number as u32),
        state: state.parse().map_err(|e| conversion_err(2, e))?,
        page_type: page_type.parse().map_err(|e| conversion_err(3, e))?,
        fingerprint: Fingerprint::new(fingerprint),
        text: row.get(5)?,
        is_in_review: row.get(6)?,
    })
}
