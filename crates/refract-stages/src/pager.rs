#![forbid(unsafe_code)]

//! Page-slicing stage.
//!
//! The stage splits its input into `page_size` groups on every run and keeps
//! them, so switching pages republishes from the stored groups without
//! touching the rest of the pipeline's work. Pages are 1-based; a page past
//! the end yields an empty list.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use refract_core::{
    ComplexStage, PipelineError, ProcessorCore, Result, Stage, StageId, Subscription,
};

use crate::config::PageConfig;

struct PagerInner<E> {
    core: ProcessorCore<Vec<E>>,
    page: Cell<usize>,
    page_size: Cell<usize>,
    pages: RefCell<Vec<Vec<E>>>,
}

/// Returns one page of its input.
///
/// Cloning creates a new handle to the same stage.
pub struct PagerStage<E> {
    inner: Rc<PagerInner<E>>,
}

impl<E: Clone + 'static> PagerStage<E> {
    /// An active pager on page 1 with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::build(PageConfig::default(), true)
    }

    #[must_use]
    pub fn with_active(active: bool) -> Self {
        Self::build(PageConfig::default(), active)
    }

    /// A pager starting from `config`.
    pub fn with_config(config: PageConfig, active: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, active))
    }

    fn build(config: PageConfig, active: bool) -> Self {
        Self {
            inner: Rc::new(PagerInner {
                core: ProcessorCore::new(Vec::new(), active),
                page: Cell::new(config.page),
                page_size: Cell::new(config.page_size),
                pages: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.inner.page.get()
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.inner.page_size.get()
    }

    /// Number of pages the last run produced.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.inner.pages.borrow().len()
    }

    #[must_use]
    pub fn config(&self) -> PageConfig {
        PageConfig {
            page: self.page(),
            page_size: self.page_size(),
        }
    }

    /// Switch to `page` (1-based) and republish it from the stored groups.
    pub fn set_page(&self, page: usize) -> Result<Vec<E>> {
        if page == 0 {
            return Err(PipelineError::InvalidPage { page });
        }
        tracing::debug!(message = "pager.page", stage = self.inner.core.id().raw(), page);
        self.inner.page.set(page);

        let core = &self.inner.core;
        if core.should_process(false) {
            Ok(core.publish(self.current_page()))
        } else {
            Ok(core.value())
        }
    }

    /// Change the page size and re-slice the last input.
    pub fn set_page_size(&self, page_size: usize) -> Result<Vec<E>> {
        if page_size == 0 {
            return Err(PipelineError::InvalidPageSize { page_size });
        }
        tracing::debug!(
            message = "pager.page_size",
            stage = self.inner.core.id().raw(),
            page_size
        );
        self.inner.page_size.set(page_size);
        Ok(self.reprocess(false))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.core.with_value(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.core.with_value(Vec::is_empty)
    }

    fn current_page(&self) -> Vec<E> {
        let index = self.inner.page.get() - 1;
        self.inner
            .pages
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

impl<E: Clone + 'static> Default for PagerStage<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for PagerStage<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for PagerStage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerStage")
            .field("core", &self.inner.core)
            .field("page", &self.inner.page.get())
            .field("page_size", &self.inner.page_size.get())
            .field("pages", &self.inner.pages.borrow().len())
            .finish()
    }
}

impl<E: Clone + 'static> ComplexStage<Vec<E>> for PagerStage<E> {
    fn core(&self) -> &ProcessorCore<Vec<E>> {
        &self.inner.core
    }

    fn transform(&self, input: Vec<E>) -> Vec<E> {
        let pages: Vec<Vec<E>> = input
            .chunks(self.inner.page_size.get())
            .map(<[E]>::to_vec)
            .collect();
        *self.inner.pages.borrow_mut() = pages;
        self.current_page()
    }
}

impl<E: Clone + 'static> Stage<Vec<E>> for PagerStage<E> {
    fn id(&self) -> StageId {
        self.inner.core.id()
    }

    fn process(&self, input: Vec<E>, force: bool) -> Vec<E> {
        self.run(input, force)
    }

    fn output(&self) -> Option<Vec<E>> {
        self.inner.core.output()
    }

    fn watch(&self, on_change: Box<dyn Fn(&Vec<E>)>) -> Option<Subscription> {
        Some(self.inner.core.watch(on_change))
    }
}
