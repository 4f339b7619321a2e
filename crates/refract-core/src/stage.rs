#![forbid(unsafe_code)]

//! The stage contract shared by plain functions and stateful processors.
//!
//! A [`Stage<T>`] turns one value into another. Plain stages ([`FnStage`])
//! are pure functions and own nothing. Stateful stages (anything implementing
//! [`ComplexStage`](crate::ComplexStage)) additionally publish their own
//! output, which lets a [`Queue`](crate::Queue) resume a recompute from the
//! middle of the chain.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::publisher::Subscription;

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity token for a stage. Allocated once per stage instance; clones of a
/// stage handle share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u64);

impl StageId {
    /// Allocate a fresh, process-unique ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

/// One transformation step of a pipeline.
///
/// The trait is object safe; queues store stages as `Rc<dyn Stage<T>>`.
pub trait Stage<T> {
    fn id(&self) -> StageId;

    /// Transform `input`. `force` asks a stateful stage to run even when it is
    /// inactive or would otherwise answer from a cache. Plain stages ignore it.
    fn process(&self, input: T, force: bool) -> T;

    /// The last published output of an active stateful stage.
    ///
    /// Queues use this as the seed when recomputing the stages that follow.
    /// Plain and inactive stages return `None` and are skipped.
    fn output(&self) -> Option<T> {
        None
    }

    /// Observe the stage's own republishes. Returns `None` for stages that
    /// never publish.
    fn watch(&self, _on_change: Box<dyn Fn(&T)>) -> Option<Subscription> {
        None
    }
}

/// A plain stage: a pure `T -> T` function.
pub struct FnStage<T> {
    id: StageId,
    transform: Rc<dyn Fn(T) -> T>,
}

impl<T> FnStage<T> {
    pub fn new(transform: impl Fn(T) -> T + 'static) -> Self {
        Self {
            id: StageId::next(),
            transform: Rc::new(transform),
        }
    }
}

impl<T> Clone for FnStage<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<T> fmt::Debug for FnStage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

impl<T> Stage<T> for FnStage<T> {
    fn id(&self) -> StageId {
        self.id
    }

    fn process(&self, input: T, _force: bool) -> T {
        (self.transform)(input)
    }
}

impl<T, S: Stage<T> + ?Sized> Stage<T> for Rc<S> {
    fn id(&self) -> StageId {
        (**self).id()
    }

    fn process(&self, input: T, force: bool) -> T {
        (**self).process(input, force)
    }

    fn output(&self) -> Option<T> {
        (**self).output()
    }

    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Option<Subscription> {
        (**self).watch(on_change)
    }
}
