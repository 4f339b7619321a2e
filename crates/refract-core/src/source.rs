#![forbid(unsafe_code)]

//! The owning data source.
//!
//! A [`DataSource<T>`] holds the authoritative raw value and publishes a
//! derived value computed by a two-tier pipeline:
//!
//! ```text
//! data ──clone──▶ [ preprocessors ] ──▶ [ processors ] ──▶ observers
//! ```
//!
//! Preprocessors are fixed at construction (built-in stages such as filter,
//! sort and page live there). Processors are open to callers through
//! [`DataSource::add_processor`] and friends.
//!
//! # Invariants
//!
//! 1. Every recompute starts from a fresh clone of the raw data; stages never
//!    see, and published values never alias, the authoritative value.
//! 2. [`DataSource::get`] returns the derived value, never the raw data.
//! 3. Observers are notified once per recompute that reaches the end of the
//!    pipeline.
//! 4. A change made from inside an observer callback (a `set`, an `update`,
//!    or a stage toggled or reconfigured) recomputes once and is delivered to
//!    every observer exactly once more after the current delivery finishes.
//!    Changes made during that second delivery are stored but not delivered,
//!    so an observer that always writes cannot recurse without bound.
//!
//! # Failure Modes
//!
//! - **Stage panics during `set`**: the raw data is already replaced, the
//!   derived value and observers are untouched, and the next `set` recomputes
//!   normally.
//! - **Observer that never settles**: observers end one value behind
//!   [`DataSource::get`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::processor::{ComplexStage, ProcessState, ProcessingGuard};
use crate::publisher::{Observer, Publisher, Subscription};
use crate::queue::Queue;
use crate::stage::Stage;

struct SourceInner<T> {
    data: RefCell<T>,
    preprocessors: Queue<T>,
    processors: Queue<T>,
    /// `[preprocessors, processors]`.
    queue: Queue<T>,
    publisher: Publisher<T>,
    dispatch: Cell<ProcessState>,
    /// A publish arrived while observers were being notified.
    pending: Cell<bool>,
    _forward: Subscription,
}

impl<T: Clone + 'static> SourceInner<T> {
    fn forward(&self, value: T) {
        if self.dispatch.get() == ProcessState::Processing {
            tracing::debug!(message = "source.reentrant_publish");
            self.publisher.replace(value);
            self.pending.set(true);
            return;
        }
        self.deliver(|| {
            self.publisher.next(value);
        });
    }

    /// Run `notify` as one observer dispatch, then redeliver once if an
    /// observer changed the value meanwhile. Nested calls run `notify`
    /// directly and leave the redelivery to the outermost dispatch.
    fn deliver<R>(&self, notify: impl FnOnce() -> R) -> R {
        if self.dispatch.get() == ProcessState::Processing {
            return notify();
        }
        let _guard = ProcessingGuard::begin(&self.dispatch);
        self.pending.set(false);
        let result = notify();
        if self.pending.replace(false) {
            tracing::debug!(message = "source.redeliver");
            self.publisher.next(self.publisher.get());
            self.pending.set(false);
        }
        result
    }
}

/// Authoritative data plus the derived value observers see.
///
/// Cloning a `DataSource` creates a new handle to the **same** source.
pub struct DataSource<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T: Clone + 'static> DataSource<T> {
    /// A source with no stages; the derived value starts equal to `data`.
    pub fn new(data: T) -> Self {
        Self::with_preprocessors(data, Vec::new())
    }

    /// A source whose preprocessor tier is `stages`, in order.
    pub fn with_preprocessors(
        data: T,
        stages: impl IntoIterator<Item = Rc<dyn Stage<T>>>,
    ) -> Self {
        let preprocessors = Queue::new(data.clone());
        for stage in stages {
            preprocessors.add_processor(stage);
        }
        let processors = Queue::new(data.clone());
        let queue = Queue::new(data.clone());
        queue.add_processor(preprocessors.clone());
        queue.add_processor(processors.clone());

        let inner = Rc::new_cyclic(|weak: &Weak<SourceInner<T>>| {
            let weak = weak.clone();
            // Inert until construction finishes: `upgrade` fails until then.
            let forward = queue.subscribe(move |value: &T| {
                if let Some(inner) = weak.upgrade() {
                    inner.forward(value.clone());
                }
            });
            SourceInner {
                data: RefCell::new(data.clone()),
                preprocessors,
                processors,
                queue,
                publisher: Publisher::new(data),
                dispatch: Cell::new(ProcessState::Idle),
                pending: Cell::new(false),
                _forward: forward,
            }
        });

        let source = Self { inner };
        source.process();
        source
    }

    /// Recompute the whole pipeline from a clone of the raw data.
    pub fn process(&self) -> T {
        let data = self.inner.data.borrow().clone();
        self.inner.queue.process(data, false)
    }

    /// Replace the raw data and recompute.
    pub fn set(&self, data: T) -> T {
        tracing::debug!(message = "source.set");
        *self.inner.data.borrow_mut() = data;
        self.process()
    }

    /// Mutate the raw data in place and recompute.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> T {
        f(&mut self.inner.data.borrow_mut());
        self.process()
    }

    pub(crate) fn with_data<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.data.borrow())
    }

    /// A copy of the current derived value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.publisher.get()
    }

    /// Borrow the current derived value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls `set` or `update` on this source.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.publisher.with(f)
    }

    /// Observe the derived value. The observer is called with the current
    /// value before this returns.
    pub fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription {
        self.inner.deliver(|| self.inner.publisher.subscribe(next))
    }

    pub fn subscribe_observer(&self, observer: impl Observer<T> + 'static) -> Subscription {
        self.inner.deliver(|| self.inner.publisher.subscribe_observer(observer))
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.publisher.observer_count()
    }

    /// Append a processor after the preprocessor tier and every existing
    /// processor. Returns the new derived value.
    pub fn add_processor(&self, stage: impl Stage<T> + 'static) -> T {
        let len = self.inner.processors.len();
        self.insert_processor(len, stage)
    }

    /// Insert a processor at `index` within the processor tier (clamped).
    pub fn insert_processor(&self, index: usize, stage: impl Stage<T> + 'static) -> T {
        let processors = &self.inner.processors;
        if processors.is_empty() {
            processors.seed(self.inner.preprocessors.get());
        }
        processors.insert_processor(index, stage);
        self.get()
    }

    /// Remove a processor by identity. Unknown stages leave the value as is.
    pub fn remove_processor<S: Stage<T> + ?Sized>(&self, stage: &S) -> T {
        self.inner.processors.remove_processor(stage);
        self.get()
    }

    /// Number of caller-added processors.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.inner.processors.len()
    }
}

impl<T> Clone for DataSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DataSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("data", &self.inner.data.borrow())
            .field("publisher", &self.inner.publisher)
            .finish()
    }
}
