#![forbid(unsafe_code)]

//! A [`DataSource`] over a `Vec` with in-place editing helpers.
//!
//! Every mutator edits the raw array in place and then recomputes, returning
//! the new derived array. Index arguments are clamped rather than rejected,
//! except for [`ArrayDataSource::assign`], which has nothing sensible to do
//! past the end.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::{PipelineError, Result};
use crate::source::DataSource;
use crate::stage::Stage;

/// A data source whose value is a list of entries.
pub struct ArrayDataSource<E> {
    source: DataSource<Vec<E>>,
}

impl<E: Clone + 'static> ArrayDataSource<E> {
    pub fn new(entries: Vec<E>) -> Self {
        Self {
            source: DataSource::new(entries),
        }
    }

    pub fn with_preprocessors(
        entries: Vec<E>,
        stages: impl IntoIterator<Item = Rc<dyn Stage<Vec<E>>>>,
    ) -> Self {
        Self {
            source: DataSource::with_preprocessors(entries, stages),
        }
    }

    /// Number of raw entries, before any stage runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.with_data(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.with_data(Vec::is_empty)
    }

    pub fn push(&self, entry: E) -> Vec<E> {
        self.source.update(|entries| entries.push(entry))
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = E>) -> Vec<E> {
        self.source.update(|current| current.extend(entries))
    }

    /// Insert `entry` before position `index` (clamped to the length).
    pub fn insert(&self, index: usize, entry: E) -> Vec<E> {
        self.insert_many(index, [entry])
    }

    /// Splice `entries` in before position `index` (clamped to the length).
    pub fn insert_many(&self, index: usize, entries: impl IntoIterator<Item = E>) -> Vec<E> {
        self.source.update(|current| {
            let index = index.min(current.len());
            current.splice(index..index, entries);
        })
    }

    /// Remove up to `count` entries starting at `index`. Both are clamped.
    pub fn remove_at(&self, index: usize, count: usize) -> Vec<E> {
        self.source.update(|current| {
            let start = index.min(current.len());
            let end = start.saturating_add(count).min(current.len());
            current.drain(start..end);
        })
    }

    /// Overwrite the entry at `index`.
    pub fn assign(&self, index: usize, entry: E) -> Result<Vec<E>> {
        let len = self.len();
        if index >= len {
            return Err(PipelineError::IndexOutOfBounds { index, len });
        }
        Ok(self.source.update(|current| current[index] = entry))
    }
}

impl<E: Clone + PartialEq + 'static> ArrayDataSource<E> {
    /// Remove the first entry equal to `entry`. Absent entries change nothing.
    pub fn remove(&self, entry: &E) -> Vec<E> {
        let Some(index) = self
            .source
            .with_data(|current| current.iter().position(|candidate| candidate == entry))
        else {
            return self.source.get();
        };
        self.source.update(|current| {
            current.remove(index);
        })
    }

    /// Remove the first match of each of `entries`, then recompute once.
    pub fn remove_many(&self, entries: &[E]) -> Vec<E> {
        self.source.update(|current| {
            for entry in entries {
                if let Some(index) = current.iter().position(|candidate| candidate == entry) {
                    current.remove(index);
                }
            }
        })
    }
}

impl<E> Deref for ArrayDataSource<E> {
    type Target = DataSource<Vec<E>>;

    fn deref(&self) -> &Self::Target {
        &self.source
    }
}

impl<E> Clone for ArrayDataSource<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for ArrayDataSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayDataSource")
            .field("source", &self.source)
            .finish()
    }
}
