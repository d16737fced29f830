// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed blob archive on the local filesystem.
//
// Layout: `<base>/<document_number>/<content_key>`. Blobs are written to a
// temporary sibling first and renamed into place, so readers never observe a
// partially written blob.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use uuid::Uuid;

use paperwerk_core::error::{PaperwerkError, Result};
use paperwerk_core::traits::DocumentArchive;
use paperwerk_core::types::{ContentKey, DocumentNumber};

/// Filesystem-backed [`DocumentArchive`].
#[derive(Debug, Clone)]
pub struct FileSystemArchive {
    base: PathBuf,
}

impl FileSystemArchive {
    /// Create an archive rooted at `base`, creating the directory if needed.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        debug!(base = %base.display(), "content archive ready");
        Ok(Self { base })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn document_dir(&self, number: DocumentNumber) -> PathBuf {
        self.base.join(number.to_string())
    }

    fn content_path(&self, number: DocumentNumber, key: &ContentKey) -> Result<PathBuf> {
        let key = key.as_str();
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(PaperwerkError::Archive(format!("invalid content key {key:?}")));
        }
        Ok(self.document_dir(number).join(key))
    }
}

impl DocumentArchive for FileSystemArchive {
    #[instrument(skip(self), fields(document = %number, key = %key))]
    fn read_content(&self, number: DocumentNumber, key: &ContentKey) -> Result<Vec<u8>> {
        let path = self.content_path(number, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PaperwerkError::NotFound(format!(
                "content {key} of document {number}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, data), fields(document = %number, key = %key, len = data.len()))]
    fn store_content(&self, number: DocumentNumber, key: &ContentKey, data: &[u8]) -> Result<()> {
        let path = self.content_path(number, key)?;
        let dir = self.document_dir(number);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("content stored");
        Ok(())
    }

    #[instrument(skip(self), fields(document = %number, from = %from, to = %to))]
    fn move_content(&self, number: DocumentNumber, from: &ContentKey, to: &ContentKey) -> Result<()> {
        let source = self.content_path(number, from)?;
        let target = self.content_path(number, to)?;

        if !source.exists() {
            return Err(PaperwerkError::NotFound(format!(
                "content {from} of document {number}"
            )));
        }
        if target.exists() {
            return Err(PaperwerkError::Archive(format!(
                "content {to} of document {number} already exists"
            )));
        }

        fs::rename(&source, &target)?;
        debug!("content moved");
        Ok(())
    }

    #[instrument(skip(self), fields(document = %number, key = %key))]
    fn delete_content(&self, number: DocumentNumber, key: &ContentKey) -> Result<()> {
        let path = self.content_path(number, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("content deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PaperwerkError::NotFound(format!(
                "content {key} of document {number}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn content_exists(&self, number: DocumentNumber, key: &ContentKey) -> Result<bool> {
        Ok(self.content_path(number, key)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperwerk_core::types::Fingerprint;

    fn key(fingerprint: &str, ext: &str) -> ContentKey {
        ContentKey::derive(&Fingerprint::new(fingerprint), ext)
    }

    fn archive() -> (tempfile::TempDir, FileSystemArchive) {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = FileSystemArchive::new(dir.path().join("archive")).expect("archive");
        (dir, archive)
    }

    #[test]
    fn store_and_read() {
        let (_dir, archive) = archive();
        let doc = DocumentNumber(1);
        archive.store_content(doc, &key("abc", "png"), b"pixels").expect("store");

        assert_eq!(archive.read_content(doc, &key("abc", "png")).expect("read"), b"pixels");
        assert!(archive.content_exists(doc, &key("abc", "png")).expect("exists"));
        assert!(archive.base_dir().join("1").join("abc.png").is_file());
    }

    #[test]
    fn blobs_are_scoped_per_document() {
        let (_dir, archive) = archive();
        archive.store_content(DocumentNumber(1), &key("abc", "png"), b"one").expect("store");
        assert!(!archive.content_exists(DocumentNumber(2), &key("abc", "png")).expect("exists"));
        assert!(matches!(
            archive.read_content(DocumentNumber(2), &key("abc", "png")),
            Err(PaperwerkError::NotFound(_))
        ));
    }

    #[test]
    fn store_replaces_existing_blob() {
        let (_dir, archive) = archive();
        let doc = DocumentNumber(1);
        archive.store_content(doc, &key("abc", "png"), b"first").expect("store");
        archive.store_content(doc, &key("abc", "png"), b"second").expect("store");
        assert_eq!(archive.read_content(doc, &key("abc", "png")).expect("read"), b"second");
    }

    #[test]
    fn move_renames_blob() {
        let (_dir, archive) = archive();
        let doc = DocumentNumber(3);
        archive.store_content(doc, &key("old", "tiff"), b"tiff").expect("store");
        archive.move_content(doc, &key("old", "tiff"), &key("new", "tiff")).expect("move");

        assert!(!archive.content_exists(doc, &key("old", "tiff")).expect("exists"));
        assert_eq!(archive.read_content(doc, &key("new", "tiff")).expect("read"), b"tiff");
    }

    #[test]
    fn move_refuses_to_overwrite() {
        let (_dir, archive) = archive();
        let doc = DocumentNumber(3);
        archive.store_content(doc, &key("a", "tiff"), b"a").expect("store");
        archive.store_content(doc, &key("b", "tiff"), b"b").expect("store");

        let result = archive.move_content(doc, &key("a", "tiff"), &key("b", "tiff"));
        assert!(matches!(result, Err(PaperwerkError::Archive(_))));
        assert_eq!(archive.read_content(doc, &key("b", "tiff")).expect("read"), b"b");
    }

    #[test]
    fn move_missing_source_fails() {
        let (_dir, archive) = archive();
        let result = archive.move_content(DocumentNumber(1), &key("a", "tiff"), &key("b", "tiff"));
        assert!(matches!(result, Err(PaperwerkError::NotFound(_))));
    }

    #[test]
    fn delete_removes_blob() {
        let (_dir, archive) = archive();
        let doc = DocumentNumber(1);
        archive.store_content(doc, &key("abc", "png"), b"x").expect("store");
        archive.delete_content(doc, &key("abc", "png")).expect("delete");
        assert!(!archive.content_exists(doc, &key("abc", "png")).expect("exists"));
        assert!(archive.delete_content(doc, &key("abc", "png")).is_err());
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let (_dir, archive) = archive();
        let bad = ContentKey::derive(&Fingerprint::new("../escape"), "png");
        assert!(matches!(
            archive.store_content(DocumentNumber(1), &bad, b"x"),
            Err(PaperwerkError::Archive(_))
        ));
    }
}
