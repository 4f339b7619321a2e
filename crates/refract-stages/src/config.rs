#![forbid(unsafe_code)]

//! Configuration for the pager and the table data source.

use refract_core::{PipelineError, Result};

/// Default number of entries per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Pager position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageConfig {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageConfig {
    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Both fields must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(PipelineError::InvalidPage { page: self.page });
        }
        if self.page_size == 0 {
            return Err(PipelineError::InvalidPageSize {
                page_size: self.page_size,
            });
        }
        Ok(())
    }
}

/// Which built-in stages a [`TableDataSource`](crate::TableDataSource) starts
/// with active, and where its pager starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TableConfig {
    pub filtering: bool,
    pub sorting: bool,
    pub paging: bool,
    pub page: PageConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            filtering: true,
            sorting: true,
            paging: true,
            page: PageConfig::default(),
        }
    }
}

impl TableConfig {
    #[must_use]
    pub fn with_filtering(mut self, enabled: bool) -> Self {
        self.filtering = enabled;
        self
    }

    #[must_use]
    pub fn with_sorting(mut self, enabled: bool) -> Self {
        self.sorting = enabled;
        self
    }

    #[must_use]
    pub fn with_paging(mut self, enabled: bool) -> Self {
        self.paging = enabled;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: PageConfig) -> Self {
        self.page = page;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.page.validate()
    }
}
