//! Snapshot iterator returned by key and field enumeration.

use std::vec;

/// Single-pass iterator over key (or field) names.
///
/// The set of names is captured when the iterator is built; records written
/// or destroyed afterwards do not affect it. Once exhausted it stays
/// exhausted.
#[derive(Debug)]
pub struct KeyIterator {
    inner: vec::IntoIter<String>,
}

impl KeyIterator {
    pub(crate) fn new(keys: Vec<String>) -> Self {
        Self {
            inner: keys.into_iter(),
        }
    }

    /// An iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns `true` if more names remain.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.inner.len() > 0
    }
}

impl Iterator for KeyIterator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for KeyIterator {}

impl std::iter::FusedIterator for KeyIterator {}
