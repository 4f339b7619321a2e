#![forbid(unsafe_code)]

//! Refract public facade crate.
//!
//! Re-exports the pipeline engine from `refract-core` and, with the default
//! `stages` feature, the built-in filter, sort and pager stages from
//! `refract-stages`.

pub use refract_core::*;

#[cfg(feature = "stages")]
pub use refract_stages as stages;

pub mod prelude {
    pub use refract_core as core;
    #[cfg(feature = "stages")]
    pub use refract_stages as stages;

    pub use refract_core::{
        ArrayDataSource, ComplexStage, DataSource, FnStage, PipelineError, Processor, Publisher,
        Queue, Stage, Subscription,
    };
    #[cfg(feature = "stages")]
    pub use refract_stages::{
        Entry, Filter, FilterStage, PageConfig, PagerStage, SortDirection, SortStage, Sorter,
        TableConfig, TableDataSource,
    };
}
