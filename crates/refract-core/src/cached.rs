#![forbid(unsafe_code)]

//! Memoizing stateful stage.
//!
//! A [`CachedProcessor<T>`] runs its transform once and then answers every
//! non-forced call from the cached output until [`invalidate`] clears the
//! `fresh` flag. Nothing invalidates the cache automatically: every setter
//! that changes what the transform would produce must call `invalidate` (or
//! `refresh`).
//!
//! [`invalidate`]: CachedProcessor::invalidate

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::processor::{ComplexStage, ProcessorCore};
use crate::publisher::Subscription;
use crate::stage::{Stage, StageId};

/// A closure-backed stage that memoizes its output.
///
/// Cloning creates a new handle to the same stage and cache.
pub struct CachedProcessor<T> {
    core: Rc<ProcessorCore<T>>,
    fresh: Rc<Cell<bool>>,
    transform: Rc<dyn Fn(T) -> T>,
}

impl<T: Clone + 'static> CachedProcessor<T> {
    pub fn new(initial: T, transform: impl Fn(T) -> T + 'static) -> Self {
        Self {
            core: Rc::new(ProcessorCore::new(initial, true)),
            fresh: Rc::new(Cell::new(false)),
            transform: Rc::new(transform),
        }
    }

    /// Whether the next non-forced call will be answered from the cache.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh.get()
    }

    /// Mark the cached output stale.
    pub fn invalidate(&self) {
        self.fresh.set(false);
    }

    /// Invalidate, then recompute from the stored input and republish.
    pub fn refresh(&self) -> T {
        self.invalidate();
        self.reprocess(false)
    }
}

impl<T> Clone for CachedProcessor<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            fresh: Rc::clone(&self.fresh),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CachedProcessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProcessor")
            .field("core", &self.core)
            .field("fresh", &self.fresh.get())
            .finish()
    }
}

impl<T: Clone + 'static> ComplexStage<T> for CachedProcessor<T> {
    fn core(&self) -> &ProcessorCore<T> {
        &self.core
    }

    fn transform(&self, input: T) -> T {
        let output = (self.transform)(input);
        self.fresh.set(true);
        output
    }

    fn run(&self, input: T, force: bool) -> T {
        let core = self.core();
        if !force && self.fresh.get() && core.is_active() && !core.is_processing() {
            tracing::trace!(message = "stage.cache_hit", stage = core.id().raw());
            core.set_last_input(input);
            return core.value();
        }
        core.process(input, force, |input| self.transform(input))
    }
}

impl<T: Clone + 'static> Stage<T> for CachedProcessor<T> {
    fn id(&self) -> StageId {
        self.core.id()
    }

    fn process(&self, input: T, force: bool) -> T {
        self.run(input, force)
    }

    fn output(&self) -> Option<T> {
        self.core.output()
    }

    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Option<Subscription> {
        Some(self.core.watch(on_change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(calls: &Rc<Cell<u32>>) -> CachedProcessor<i32> {
        let calls = Rc::clone(calls);
        CachedProcessor::new(0, move |x: i32| {
            calls.set(calls.get() + 1);
            x * 3
        })
    }

    #[test]
    fn transform_runs_once_until_invalidated() {
        let calls = Rc::new(Cell::new(0));
        let cached = counting(&calls);

        assert_eq!(cached.process(2, false), 6);
        assert!(cached.is_fresh());
        // Cache hit even for a new input.
        assert_eq!(cached.process(5, false), 6);
        assert_eq!(calls.get(), 1);

        cached.invalidate();
        assert_eq!(cached.process(5, false), 15);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn force_bypasses_the_cache() {
        let calls = Rc::new(Cell::new(0));
        let cached = counting(&calls);
        cached.process(1, false);
        assert_eq!(cached.process(4, true), 12);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn refresh_recomputes_from_the_latest_input() {
        let calls = Rc::new(Cell::new(0));
        let cached = counting(&calls);
        cached.process(1, false);
        cached.process(7, false);
        assert_eq!(cached.get(), 3);
        assert_eq!(cached.refresh(), 21);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn inactive_cached_stage_passes_through() {
        let calls = Rc::new(Cell::new(0));
        let cached = counting(&calls);
        cached.process(2, false);
        cached.set_active(false);
        assert_eq!(cached.process(9, false), 9);
        assert_eq!(cached.set_active(true), 27);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn cache_hit_does_not_republish() {
        let calls = Rc::new(Cell::new(0));
        let cached = counting(&calls);
        let publishes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&publishes);
        let _sub = cached.subscribe(move |_| counter.set(counter.get() + 1));

        cached.process(1, false);
        cached.process(1, false);
        // Immediate delivery plus one publish.
        assert_eq!(publishes.get(), 2);
    }
}
