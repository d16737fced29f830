// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document archive locks.
//
// Blob deletion decides from page records whether a blob is still referenced.
// Intake writes a blob and then adds the page that references it. Both
// sequences take the document's lock so a deletion never falls between them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::DocumentNumber;

const STRIPES: usize = 64;

/// Striped locks keyed by document number. Share one instance between every
/// component that writes or deletes archive content.
#[derive(Debug)]
pub struct ArchiveLocks {
    stripes: Vec<Mutex<()>>,
}

impl ArchiveLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold the lock of `number` until the guard drops.
    pub fn lock(&self, number: DocumentNumber) -> MutexGuard<'_, ()> {
        let stripe = (number.0 % self.stripes.len() as u64) as usize;
        self.stripes[stripe].lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ArchiveLocks {
    fn default() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }
}
