#![forbid(unsafe_code)]

//! Stateful, activatable stages.
//!
//! [`ProcessorCore<T>`] is the shared helper every stateful stage composes: an
//! `active` flag, the last input it was handed, a publisher for its own
//! output, and an explicit [`ProcessState`] machine that guards against
//! re-entrant processing. [`ComplexStage<T>`] layers the public surface
//! (`set_active`, `reprocess`, `subscribe`, ...) on top of a core plus a
//! transform.
//!
//! # Invariants
//!
//! 1. `process` stores its input as `last_input` before anything else.
//! 2. While a stage is `Processing`, a nested `process` call returns the last
//!    published output without running the transform (Idle → Processing →
//!    Idle; nested calls short-circuit).
//! 3. An inactive stage returns its input unchanged and publishes nothing,
//!    unless the call is forced.
//! 4. The processing state returns to `Idle` even if the transform panics.
//!
//! # Failure Modes
//!
//! - **Transform panics**: nothing is published; the previous output stays
//!   current and the stage accepts the next call normally.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::publisher::{Publisher, Subscription};
use crate::stage::{Stage, StageId};

/// Processing state of a stage, queue or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Idle,
    Processing,
}

/// Holds a state cell at `Processing` for its lifetime.
pub(crate) struct ProcessingGuard<'a> {
    state: &'a Cell<ProcessState>,
}

impl<'a> ProcessingGuard<'a> {
    pub(crate) fn begin(state: &'a Cell<ProcessState>) -> Self {
        state.set(ProcessState::Processing);
        Self { state }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ProcessState::Idle);
    }
}

/// The "activatable + publishing" part of a stateful stage.
pub struct ProcessorCore<T> {
    id: StageId,
    active: Cell<bool>,
    state: Cell<ProcessState>,
    /// Set once the transform has published at least one output.
    primed: Cell<bool>,
    last_input: RefCell<T>,
    publisher: Publisher<T>,
}

impl<T: Clone + 'static> ProcessorCore<T> {
    /// A core whose published value and `last_input` both start at `initial`.
    #[must_use]
    pub fn new(initial: T, active: bool) -> Self {
        Self {
            id: StageId::next(),
            active: Cell::new(active),
            state: Cell::new(ProcessState::Idle),
            primed: Cell::new(false),
            last_input: RefCell::new(initial.clone()),
            publisher: Publisher::new(initial),
        }
    }

    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Flip the active flag without processing anything.
    pub fn mark_active(&self, active: bool) {
        tracing::debug!(message = "stage.active", stage = self.id.raw(), active);
        self.active.set(active);
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state.get() == ProcessState::Processing
    }

    /// Whether a call with this `force` would run the transform.
    #[must_use]
    pub fn should_process(&self, force: bool) -> bool {
        !self.is_processing() && (self.is_active() || force)
    }

    /// The last published output.
    #[must_use]
    pub fn value(&self) -> T {
        self.publisher.get()
    }

    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.publisher.with(f)
    }

    /// The last published output, if the stage is active and has run.
    #[must_use]
    pub fn output(&self) -> Option<T> {
        (self.is_active() && self.primed.get()).then(|| self.value())
    }

    #[must_use]
    pub fn last_input(&self) -> T {
        self.last_input.borrow().clone()
    }

    /// Store `input` as the value `reprocess` will use, without processing.
    pub fn set_last_input(&self, input: T) {
        *self.last_input.borrow_mut() = input;
    }

    pub fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription {
        self.publisher.subscribe(next)
    }

    pub fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Subscription {
        self.publisher.subscribe(move |value| on_change(value))
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.publisher.observer_count()
    }

    /// Publish `value` as this stage's output.
    pub fn publish(&self, value: T) -> T {
        self.primed.set(true);
        self.publisher.next(value)
    }

    /// Run `f` with the state held at `Processing`.
    pub fn guarded<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = ProcessingGuard::begin(&self.state);
        f()
    }

    /// Store `input`, then run `transform` and publish its result if the stage
    /// is active (or `force` is set) and not already processing.
    pub fn process(&self, input: T, force: bool, transform: impl FnOnce(T) -> T) -> T {
        self.set_last_input(input.clone());

        if self.is_processing() {
            tracing::debug!(message = "stage.reentrant", stage = self.id.raw());
            return self.value();
        }
        if !self.should_process(force) {
            return input;
        }

        let output = self.guarded(|| transform(input));
        self.publish(output)
    }

    /// Publish `last_input` unchanged, so observers see the stage bypassed.
    pub fn bypass(&self) -> T {
        if self.is_processing() {
            tracing::debug!(message = "stage.reentrant", stage = self.id.raw());
            return self.value();
        }
        let input = self.last_input();
        self.publisher.next(input)
    }
}

impl<T: fmt::Debug> fmt::Debug for ProcessorCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorCore")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .field("state", &self.state.get())
            .field("publisher", &self.publisher)
            .finish()
    }
}

/// A stateful stage: a [`ProcessorCore`] plus a transform.
///
/// Implementors provide `core` and `transform`; everything else has a default
/// built on those two. Implementors also implement [`Stage`] by delegating to
/// `run`, `ProcessorCore::output` and `ProcessorCore::watch`.
pub trait ComplexStage<T: Clone + 'static> {
    fn core(&self) -> &ProcessorCore<T>;

    /// The transformation itself. Called only through `run`.
    fn transform(&self, input: T) -> T;

    /// Process `input` through the core's state machine.
    fn run(&self, input: T, force: bool) -> T {
        self.core().process(input, force, |input| self.transform(input))
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    /// Activate or deactivate the stage.
    ///
    /// Activating forces one transform of the stored input and publishes it.
    /// Deactivating publishes the stored input unchanged.
    fn set_active(&self, active: bool) -> T {
        self.core().mark_active(active);
        if active {
            self.reprocess(true)
        } else {
            self.core().bypass()
        }
    }

    /// Re-run against the stored `last_input`.
    fn reprocess(&self, force: bool) -> T {
        let input = self.core().last_input();
        self.run(input, force)
    }

    /// The last published output.
    fn get(&self) -> T {
        self.core().value()
    }

    fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.core().subscribe(next)
    }
}

/// A stateful stage backed by a closure.
///
/// Cloning a `Processor` creates a new handle to the **same** stage, so one
/// handle can be added to a queue while another toggles it.
pub struct Processor<T> {
    core: Rc<ProcessorCore<T>>,
    transform: Rc<dyn Fn(T) -> T>,
}

impl<T: Clone + 'static> Processor<T> {
    /// An active processor publishing `initial` until its first run.
    pub fn new(initial: T, transform: impl Fn(T) -> T + 'static) -> Self {
        Self::with_active(initial, true, transform)
    }

    /// A processor that passes values through until activated.
    pub fn inactive(initial: T, transform: impl Fn(T) -> T + 'static) -> Self {
        Self::with_active(initial, false, transform)
    }

    pub fn with_active(initial: T, active: bool, transform: impl Fn(T) -> T + 'static) -> Self {
        Self {
            core: Rc::new(ProcessorCore::new(initial, active)),
            transform: Rc::new(transform),
        }
    }
}

impl<T> Clone for Processor<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Processor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor").field("core", &self.core).finish()
    }
}

impl<T: Clone + 'static> ComplexStage<T> for Processor<T> {
    fn core(&self) -> &ProcessorCore<T> {
        &self.core
    }

    fn transform(&self, input: T) -> T {
        (self.transform)(input)
    }
}

impl<T: Clone + 'static> Stage<T> for Processor<T> {
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
