#![forbid(unsafe_code)]

//! Ordered stage pipeline with localized recompute.
//!
//! A [`Queue<T>`] threads a value through its stages in list order and
//! publishes the result. It is itself a stateful stage, so queues nest.
//!
//! # Design
//!
//! For every stage that publishes (anything whose [`Stage::watch`] returns a
//! subscription) the queue keeps a watch callback. When such a stage
//! republishes on its own, for example because its configuration changed, the
//! queue recomputes only the stages after it, seeded with that stage's output.
//!
//! Partial recomputes find their seed by walking backward from the change
//! point to the nearest stage with a cached [`Stage::output`]; if there is
//! none the queue's own last input is used. Stages between the seed and the
//! change point that have no cached output (plain functions, inactive stages)
//! are replayed, so the result always equals a full run.
//!
//! # Invariants
//!
//! 1. Evaluation order is list order. Nothing is reordered.
//! 2. A change to stage `k` never re-runs a stateful stage before `k`.
//! 3. Inserting or removing at `i` recomputes from `i`; a republish by the
//!    stage at `k` recomputes from `k + 1`.
//! 4. Full and partial recomputes both hold the queue's `Processing` state, so
//!    stage republishes that happen during a queue run are ignored.
//!
//! # Failure Modes
//!
//! - **Stage panics mid-run**: the queue publishes nothing and returns to
//!   `Idle`; stages before the panicking one keep the outputs they published.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::processor::{ComplexStage, ProcessorCore};
use crate::publisher::Subscription;
use crate::stage::{Stage, StageId};

struct Slot<T> {
    stage: Rc<dyn Stage<T>>,
    /// Keeps the republish callback registered while the stage is queued.
    _watch: Option<Subscription>,
}

struct QueueInner<T> {
    core: ProcessorCore<T>,
    slots: RefCell<Vec<Slot<T>>>,
}

/// An ordered, mutable list of stages evaluated in sequence.
///
/// Cloning a `Queue` creates a new handle to the **same** pipeline.
pub struct Queue<T> {
    inner: Rc<QueueInner<T>>,
}

impl<T: Clone + 'static> Queue<T> {
    /// An empty, active queue publishing `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_active(initial, true)
    }

    #[must_use]
    pub fn with_active(initial: T, active: bool) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                core: ProcessorCore::new(initial, active),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.borrow().is_empty()
    }

    /// Position of the stage with this id, if queued.
    #[must_use]
    pub fn position(&self, id: StageId) -> Option<usize> {
        self.inner
            .slots
            .borrow()
            .iter()
            .position(|slot| slot.stage.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.position(id).is_some()
    }

    /// Append `stage` and recompute from its position.
    pub fn add_processor(&self, stage: impl Stage<T> + 'static) -> T {
        let len = self.len();
        self.insert_processor(len, stage)
    }

    /// Insert `stage` at `index` (clamped to the length) and recompute from
    /// there.
    pub fn insert_processor(&self, index: usize, stage: impl Stage<T> + 'static) -> T {
        let stage: Rc<dyn Stage<T>> = Rc::new(stage);
        let id = stage.id();

        // The watch delivers the current value immediately; the stage is not
        // queued yet, so that first call finds no position and does nothing.
        let weak = Rc::downgrade(&self.inner);
        let watch = stage.watch(Box::new(move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let queue = Queue { inner };
            if let Some(position) = queue.position(id) {
                queue.reprocess_from(position + 1, false);
            }
        }));

        let (index, len) = {
            let mut slots = self.inner.slots.borrow_mut();
            let index = index.min(slots.len());
            slots.insert(
                index,
                Slot {
                    stage,
                    _watch: watch,
                },
            );
            (index, slots.len())
        };
        tracing::debug!(
            message = "queue.insert",
            queue = self.inner.core.id().raw(),
            stage = id.raw(),
            index,
            len
        );

        self.reprocess_from(index, false)
    }

    /// Remove `stage` (matched by id) and recompute from where it was.
    /// Removing a stage that is not queued returns the current value.
    pub fn remove_processor<S: Stage<T> + ?Sized>(&self, stage: &S) -> T {
        self.remove_by_id(stage.id())
    }

    pub fn remove_by_id(&self, id: StageId) -> T {
        let removed = {
            let mut slots = self.inner.slots.borrow_mut();
            slots
                .iter()
                .position(|slot| slot.stage.id() == id)
                .map(|index| (index, slots.remove(index)))
        };

        let Some((index, slot)) = removed else {
            return self.inner.core.value();
        };
        // Unsubscribes the watch.
        drop(slot);
        tracing::debug!(
            message = "queue.remove",
            queue = self.inner.core.id().raw(),
            stage = id.raw(),
            index
        );

        self.reprocess_from(index, false)
    }

    /// The value stage `index` would receive: the output of the nearest
    /// preceding stage that has one, else the queue's last input.
    #[must_use]
    pub fn input_for(&self, index: usize) -> T {
        self.seed_for(index).1
    }

    /// Start position and seed value for a recompute from `index`.
    fn seed_for(&self, index: usize) -> (usize, T) {
        let slots = self.inner.slots.borrow();
        let end = index.min(slots.len());
        slots[..end]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(position, slot)| slot.stage.output().map(|out| (position + 1, out)))
            .unwrap_or_else(|| (0, self.inner.core.last_input()))
    }

    fn snapshot(&self, start: usize) -> Vec<Rc<dyn Stage<T>>> {
        self.inner
            .slots
            .borrow()
            .iter()
            .skip(start)
            .map(|slot| Rc::clone(&slot.stage))
            .collect()
    }

    /// Recompute the stages from `index` to the end and publish the result.
    ///
    /// Returns the current value without running anything if the queue is
    /// inactive (and `force` is unset) or already processing.
    pub fn reprocess_from(&self, index: usize, force: bool) -> T {
        let core = &self.inner.core;
        if !core.should_process(force) {
            return core.value();
        }

        let (start, seed) = self.seed_for(index);
        let stages = self.snapshot(start);
        tracing::trace!(
            message = "queue.reprocess",
            queue = core.id().raw(),
            from = start,
            stages = stages.len()
        );

        let output = core.guarded(|| {
            stages
                .iter()
                .fold(seed, |value, stage| stage.process(value, false))
        });
        core.publish(output)
    }

    /// Store `input` as the value the next partial recompute starts from,
    /// without processing.
    pub fn seed(&self, input: T) {
        self.inner.core.set_last_input(input);
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("core", &self.inner.core)
            .field("stages", &self.inner.slots.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> ComplexStage<T> for Queue<T> {
    fn core(&self) -> &ProcessorCore<T> {
        &self.inner.core
    }

    fn transform(&self, input: T) -> T {
        let stages = self.snapshot(0);
        let _span = tracing::trace_span!(
            "queue.run",
            queue = self.inner.core.id().raw(),
            stages = stages.len()
        )
        .entered();
        stages
            .iter()
            .fold(input, |value, stage| stage.process(value, false))
    }
}

impl<T: Clone + 'static> Stage<T> for Queue<T> {
    fn id(&self) -> StageId {
        self.inner.core.id()
    }

    fn process(&self, input: T, force: bool) -> T {
        self.run(input, force)
    }

    fn output(&self) -> Option<T> {
        self.inner.core.output()
    }

    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Option<Subscription> {
        Some(self.inner.core.watch(on_change))
    }
}
