//! Path interning
//!
//! Large reports repeat the same path on many files and classes. Every path
//! assigned to a node goes through a `PathInterner`, so equal strings share
//! one allocation.

use std::collections::HashSet;
use std::sync::Arc;

/// Content-addressed table of canonical path strings
#[derive(Debug, Default)]
pub struct PathInterner {
    table: HashSet<Arc<str>>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical copy of `path`, storing it on first sight
    pub fn intern(&mut self, path: &str) -> Arc<str> {
        if let Some(existing) = self.table.get(path) {
            return Arc::clone(existing);
        }
        let canonical: Arc<str> = Arc::from(path);
        self.table.insert(Arc::clone(&canonical));
        canonical
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
