#![forbid(unsafe_code)]

//! Built-in list stages for Refract pipelines.
//!
//! - [`FilterStage`]: keeps the entries matching a [`Filter`].
//! - [`SortStage`]: stable sort by a [`Sorter`] in a [`SortDirection`].
//! - [`PagerStage`]: one 1-based page of the input.
//! - [`TableDataSource`]: an array source with all three as preprocessors.
//!
//! Entries are inspected through the [`Entry`] trait, implemented for
//! `serde_json::Value` and the primitive types.

pub mod config;
pub mod entry;
pub mod filter;
pub mod pager;
pub mod sorter;
pub mod table_source;

pub use config::{DEFAULT_PAGE_SIZE, PageConfig, TableConfig};
pub use entry::{Entry, compare_values, value_is_truthy};
pub use filter::{Filter, FilterStage};
pub use pager::PagerStage;
pub use sorter::{SortDirection, SortKey, SortStage, Sorter};
pub use table_source::TableDataSource;
