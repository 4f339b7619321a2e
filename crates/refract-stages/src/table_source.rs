#![forbid(unsafe_code)]

//! Array source with filter, sort and pager preprocessors.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use refract_core::{ArrayDataSource, Result, Stage};

use crate::config::TableConfig;
use crate::entry::Entry;
use crate::filter::FilterStage;
use crate::pager::PagerStage;
use crate::sorter::SortStage;

/// A table of rows: an [`ArrayDataSource`] whose preprocessor tier is a
/// [`FilterStage`], a [`SortStage`] and a [`PagerStage`], in that order.
///
/// Configure the stages through [`filtering`](Self::filtering),
/// [`sorting`](Self::sorting) and [`paging`](Self::paging); each setter
/// recomputes only the stages after it. Caller-added processors run on the
/// current page.
pub struct TableDataSource<R> {
    source: ArrayDataSource<R>,
    filter: FilterStage<R>,
    sort: SortStage<R>,
    pager: PagerStage<R>,
}

impl<R: Entry + Clone + 'static> TableDataSource<R> {
    /// A table with every stage active and the pager on page 1.
    pub fn new(rows: Vec<R>) -> Self {
        let config = TableConfig::default();
        Self::build(rows, config, PagerStage::with_active(config.paging))
    }

    pub fn with_config(rows: Vec<R>, config: TableConfig) -> Result<Self> {
        let pager = PagerStage::with_config(config.page, config.paging)?;
        Ok(Self::build(rows, config, pager))
    }

    fn build(rows: Vec<R>, config: TableConfig, pager: PagerStage<R>) -> Self {
        let filter = FilterStage::with_active(config.filtering);
        let sort = SortStage::with_active(config.sorting);
        let stages: [Rc<dyn Stage<Vec<R>>>; 3] = [
            Rc::new(filter.clone()),
            Rc::new(sort.clone()),
            Rc::new(pager.clone()),
        ];
        tracing::debug!(
            message = "table.new",
            rows = rows.len(),
            filtering = config.filtering,
            sorting = config.sorting,
            paging = config.paging
        );
        Self {
            source: ArrayDataSource::with_preprocessors(rows, stages),
            filter,
            sort,
            pager,
        }
    }

    pub fn filtering(&self) -> &FilterStage<R> {
        &self.filter
    }

    pub fn sorting(&self) -> &SortStage<R> {
        &self.sort
    }

    pub fn paging(&self) -> &PagerStage<R> {
        &self.pager
    }
}

impl<R> Deref for TableDataSource<R> {
    type Target = ArrayDataSource<R>;

    fn deref(&self) -> &Self::Target {
        &self.source
    }
}

impl<R> Clone for TableDataSource<R> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            pager: self.pager.clone(),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for TableDataSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDataSource")
            .field("source", &self.source)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("pager", &self.pager)
            .finish()
    }
}
