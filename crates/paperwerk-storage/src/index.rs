// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-text document index backed by SQLite FTS5.
//
// Each document is projected into one metadata row, one FTS5 row whose rowid
// is the document number, and one FTS5 row per page carrying the page number
// and its recognized text. Documents are ranked on the document row, which
// holds the page texts concatenated in page order; the page rows tell which
// pages a hit came from. Re-indexing replaces all rows of a document inside a
// single transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, params};
use tracing::{debug, info, instrument};

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::{DocumentIndex, Documents};
use paperwerk_core::types::{Document, DocumentNumber, PageNumber, PageRequest, SearchHit, SearchResults};

const CREATE_INDEX_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS index_entries (
        document_number INTEGER PRIMARY KEY,
        owner TEXT NOT NULL,
        title TEXT NOT NULL,
        date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        page_count INTEGER NOT NULL
    );
    CREATE VIRTUAL TABLE IF NOT EXISTS index_fts USING fts5(
        title,
        owner,
        content
    );
    CREATE VIRTUAL TABLE IF NOT EXISTS index_pages USING fts5(
        text,
        document_number UNINDEXED,
        page_number UNINDEXED
    );
"#;

fn index_err(e: rusqlite::Error) -> PaperwerkError {
    PaperwerkError::Index(e.to_string())
}

/// SQLite FTS5 implementation of [`DocumentIndex`].
pub struct SqliteDocumentIndex {
    conn: Mutex<Connection>,
    documents: Arc<dyn Documents>,
    batch_size: u64,
    created: bool,
}

impl SqliteDocumentIndex {
    /// Open (or create) the index at `path`.
    ///
    /// Use [`was_created`](Self::was_created) to find out whether the index
    /// is new and needs a bulk [`index_all_documents`](DocumentIndex::index_all_documents).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, documents: Arc<dyn Documents>, batch_size: u64) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(index_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PaperwerkError::Index(format!("WAL pragma: {e}")))?;
        Self::init(conn, documents, batch_size)
    }

    /// Open an in-memory index (useful for tests).
    pub fn open_in_memory(documents: Arc<dyn Documents>, batch_size: u64) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(index_err)?;
        Self::init(conn, documents, batch_size)
    }

    fn init(conn: Connection, documents: Arc<dyn Documents>, batch_size: u64) -> Result<Self> {
        let existed: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'index_pages')",
                [],
                |row| row.get(0),
            )
            .map_err(index_err)?;
        conn.execute_batch(CREATE_INDEX_SQL)
            .map_err(|e| PaperwerkError::Index(format!("create index tables: {e}")))?;

        info!(created = !existed, "document index opened");
        Ok(Self {
            conn: Mutex::new(conn),
            documents,
            batch_size: batch_size.max(1),
            created: !existed,
        })
    }

    /// Whether this index was created by the call that opened it.
    pub fn was_created(&self) -> bool {
        self.created
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PaperwerkError::Index("index connection poisoned".into()))
    }

    fn upsert(tx: &Transaction<'_>, document: &Document) -> Result<()> {
        let number = document.document_number.0 as i64;
        let content = document
            .pages
            .iter()
            .map(|page| page.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        tx.execute("DELETE FROM index_fts WHERE rowid = ?1", params![number])
            .map_err(index_err)?;
        tx.execute(
            "INSERT INTO index_fts (rowid, title, owner, content) VALUES (?1, ?2, ?3, ?4)",
            params![number, document.title, document.owner, content],
        )
        .map_err(index_err)?;

        tx.execute("DELETE FROM index_pages WHERE document_number = ?1", params![number])
            .map_err(index_err)?;
        {
            let mut insert = tx
                .prepare_cached("INSERT INTO index_pages (text, document_number, page_number) VALUES (?1, ?2, ?3)")
                .map_err(index_err)?;
            for page in document.pages.iter().filter(|page| !page.text.is_empty()) {
                insert
                    .execute(params![page.text, number, page.page_number.0 as i64])
                    .map_err(index_err)?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO index_entries
                (document_number, owner, title, date, created_at, updated_at, page_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                number,
                document.owner,
                document.title,
                document.date.map(|d| d.to_string()),
                document.created_at.to_rfc3339(),
                document.updated_at.to_rfc3339(),
                document.pages.len() as i64,
            ],
        )
        .map_err(index_err)?;
        Ok(())
    }
}

impl DocumentIndex for SqliteDocumentIndex {
    #[instrument(skip(self), fields(document = %number))]
    fn index_document(&self, number: DocumentNumber) -> Result<()> {
        let document = self
            .documents
            .get_by_document_number(number)?
            .ok_or_else(|| PaperwerkError::NotFound(format!("document {number}")))?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(index_err)?;
        Self::upsert(&tx, &document)?;
        tx.commit().map_err(index_err)?;

        debug!(pages = document.pages.len(), "document indexed");
        Ok(())
    }

    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    fn index_all_documents(&self) -> Result<u64> {
        let mut request = PageRequest::new(0, self.batch_size);
        let mut indexed = 0u64;

        loop {
            let batch = self.documents.find(request)?;
            if batch.is_empty() {
                break;
            }

            {
                let mut conn = self.lock()?;
                let tx = conn.transaction().map_err(index_err)?;
                for document in &batch {
                    Self::upsert(&tx, document)?;
                }
                tx.commit().map_err(index_err)?;
            }

            indexed += batch.len() as u64;
            debug!(indexed, "index batch committed");
            if (batch.len() as u64) < self.batch_size {
                break;
            }
            request = request.next();
        }

        info!(indexed, "all documents indexed");
        Ok(indexed)
    }

    #[instrument(skip(self))]
    fn search(&self, query: &str, page: PageRequest) -> Result<SearchResults> {
        let conn = self.lock()?;
        let limit = page.size as i64;
        let offset = page.offset as i64;

        let Some(fts_query) = to_fts_query(query) else {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))
                .map_err(index_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT document_number FROM index_entries
                     ORDER BY document_number LIMIT ?1 OFFSET ?2",
                )
                .map_err(index_err)?;
            let hits = stmt
                .query_map(params![limit, offset], |row| {
                    Ok(SearchHit {
                        document_number: DocumentNumber(row.get::<_, i64>(0)? as u64),
                        score: 0.0,
                        pages: Vec::new(),
                    })
                })
                .map_err(index_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(index_err)?;
            return Ok(SearchResults {
                hits,
                total: total as u64,
            });
        };

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM index_fts WHERE index_fts MATCH ?1",
                params![fts_query],
                |row| row.get(0),
            )
            .map_err(index_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT rowid, bm25(index_fts) AS score FROM index_fts
                 WHERE index_fts MATCH ?1
                 ORDER BY score, rowid LIMIT ?2 OFFSET ?3",
            )
            .map_err(index_err)?;
        let mut hits = stmt
            .query_map(params![fts_query, limit, offset], |row| {
                Ok(SearchHit {
                    document_number: DocumentNumber(row.get::<_, i64>(0)? as u64),
                    // bm25() is lower-is-better; flip so callers see higher-is-better.
                    score: -row.get::<_, f64>(1)?,
                    pages: Vec::new(),
                })
            })
            .map_err(index_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(index_err)?;

        let any_term = to_fts_query_any(query).unwrap_or_default();
        let mut pages = conn
            .prepare_cached(
                "SELECT page_number FROM index_pages
                 WHERE index_pages MATCH ?1 AND document_number = ?2
                 ORDER BY page_number",
            )
            .map_err(index_err)?;
        for hit in &mut hits {
            hit.pages = pages
                .query_map(params![any_term, hit.document_number.0 as i64], |row| {
                    Ok(PageNumber(row.get::<_, i64>(0)? as u32))
                })
                .map_err(index_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(index_err)?;
        }

        debug!(total, returned = hits.len(), "search finished");
        Ok(SearchResults {
            hits,
            total: total as u64,
        })
    }
}

/// Turn free text into an FTS5 query: every term quoted, all terms required.
/// Returns `None` for a blank query.
fn to_fts_query(query: &str) -> Option<String> {
    join_terms(query, " AND ")
}

/// Like [`to_fts_query`], but any single term matches.
fn to_fts_query_any(query: &str) -> Option<String> {
    join_terms(query, " OR ")
}

fn join_terms(query: &str, operator: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(operator))
    }
}
