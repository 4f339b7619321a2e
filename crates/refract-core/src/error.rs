#![forbid(unsafe_code)]

//! Error type shared by every Refract crate.
//!
//! Only configuration mistakes are reported as errors. Stage transforms are
//! infallible `Fn(T) -> T`; a panicking transform unwinds to whoever called
//! `process`, `reprocess` or `set`, and the processing guards reset on the way
//! out so the pipeline stays usable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("page must be a positive whole number, got {page}")]
    InvalidPage { page: usize },

    #[error("page size must be a positive whole number, got {page_size}")]
    InvalidPageSize { page_size: usize },

    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}
