#![forbid(unsafe_code)]

//! Current-value publisher with synchronous observer notification.
//!
//! [`Publisher<T>`] holds the most recently published value and an
//! insertion-ordered list of observer registrations. It behaves like a
//! "behaviour subject": subscribing delivers the current value immediately,
//! and every [`Publisher::next`] delivers the new value to every observer that
//! was registered when the call started.
//!
//! # Invariants
//!
//! 1. [`Publisher::get`] always returns the value of the most recent `next`
//!    (or `replace`) call.
//! 2. `subscribe` calls the observer exactly once, synchronously, before it
//!    returns.
//! 3. `next` iterates a snapshot of the registrations taken at call start:
//!    observers registered during the call are not notified by it.
//! 4. Removal is by [`SubscriptionId`]; unsubscribing twice is a no-op.
//!
//! # Failure Modes
//!
//! - **Observer panics**: the new value is already stored; observers after the
//!   panicking one in the snapshot are not notified for that update.
//! - **Publisher dropped**: outstanding [`Subscription`]s become inert.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::PipelineError;

/// Receives the values pushed by a [`Publisher`].
///
/// Plain closures `Fn(&T)` are observers. `error` and `complete` exist for
/// callers that share observers with other observable types; the pipeline
/// itself never fails or completes a stream, so it never calls them.
pub trait Observer<T> {
    /// Called with the current value on subscribe and with every update.
    fn next(&self, value: &T);

    /// Never invoked by Refract.
    fn error(&self, _error: &PipelineError) {}

    /// Never invoked by Refract.
    fn complete(&self) {}
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T),
{
    fn next(&self, value: &T) {
        self(value);
    }
}

/// Identity of one observer registration on one publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct Registration<T> {
    id: SubscriptionId,
    observer: Rc<dyn Observer<T>>,
}

struct Shared<T> {
    value: RefCell<T>,
    registrations: RefCell<Vec<Registration<T>>>,
    next_id: Cell<u64>,
}

impl<T> Shared<T> {
    fn remove(&self, id: SubscriptionId) {
        // Drop the observer after the borrow ends: its captures may own
        // subscriptions of their own.
        let removed = {
            let mut registrations = self.registrations.borrow_mut();
            registrations
                .iter()
                .position(|registration| registration.id == id)
                .map(|index| registrations.remove(index))
        };
        drop(removed);
    }
}

/// The observable-value primitive: a current value plus its observers.
pub struct Publisher<T> {
    shared: Rc<Shared<T>>,
}

impl<T: Clone + 'static> Publisher<T> {
    /// Create a publisher holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(initial),
                registrations: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// A copy of the last published value.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Access the last published value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure publishes on this same publisher.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.borrow())
    }

    /// Register a `next` callback. It is called with the current value before
    /// this returns.
    pub fn subscribe(&self, next: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_rc(Rc::new(next))
    }

    /// Register a full [`Observer`].
    pub fn subscribe_observer(&self, observer: impl Observer<T> + 'static) -> Subscription {
        self.subscribe_rc(Rc::new(observer))
    }

    pub(crate) fn subscribe_rc(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        let id = SubscriptionId(self.shared.next_id.get());
        self.shared.next_id.set(id.0 + 1);

        let current = self.get();
        observer.next(&current);

        self.shared
            .registrations
            .borrow_mut()
            .push(Registration { id, observer });

        let weak = Rc::downgrade(&self.shared);
        Subscription::new(id, move || {
            if let Some(shared) = weak.upgrade() {
                shared.remove(id);
            }
        })
    }

    /// Replace the published value and notify every registered observer.
    /// Returns the value for chaining.
    pub fn next(&self, value: T) -> T {
        *self.shared.value.borrow_mut() = value.clone();

        let observers: Vec<Rc<dyn Observer<T>>> = self
            .shared
            .registrations
            .borrow()
            .iter()
            .map(|registration| Rc::clone(&registration.observer))
            .collect();

        for observer in &observers {
            observer.next(&value);
        }

        value
    }

    /// Replace the published value without notifying anyone.
    pub(crate) fn replace(&self, value: T) -> T {
        *self.shared.value.borrow_mut() = value.clone();
        value
    }

    /// Number of live registrations.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.shared.registrations.borrow().len()
    }
}

impl<T: fmt::Debug> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("value", &self.shared.value.borrow())
            .field("observers", &self.shared.registrations.borrow().len())
            .finish()
    }
}

/// Handle to one observer registration.
///
/// Dropping the handle unsubscribes. [`Subscription::unsubscribe`] may be
/// called any number of times; only the first call has an effect.
#[must_use = "dropping a Subscription unsubscribes its observer"]
pub struct Subscription {
    id: SubscriptionId,
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(id: SubscriptionId, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.cancel.borrow().is_some()
    }

    /// Remove the registration. Idempotent.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |value: &T| sink.borrow_mut().push(value.clone()))
    }

    #[test]
    fn subscribe_delivers_current_value_immediately() {
        let publisher = Publisher::new(7);
        let (seen, observer) = recorder();
        let _sub = publisher.subscribe(observer);
        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn next_notifies_every_observer() {
        let publisher = Publisher::new(0);
        let (a, obs_a) = recorder();
        let (b, obs_b) = recorder();
        let _sa = publisher.subscribe(obs_a);
        let _sb = publisher.subscribe(obs_b);

        assert_eq!(publisher.next(1), 1);
        assert_eq!(publisher.next(2), 2);

        assert_eq!(*a.borrow(), vec![0, 1, 2]);
        assert_eq!(*b.borrow(), vec![0, 1, 2]);
        assert_eq!(publisher.get(), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let publisher = Publisher::new(0);
        let (seen, observer) = recorder();
        let sub = publisher.subscribe(observer);
        assert_eq!(publisher.observer_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_subscribed());
        assert_eq!(publisher.observer_count(), 0);

        publisher.next(5);
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[test]
    fn unsubscribe_removes_only_its_own_registration() {
        let publisher = Publisher::new(0);
        let (a, obs_a) = recorder();
        // Same closure type twice: identity is the token, not the function.
        let sink = Rc::clone(&a);
        let sub_a = publisher.subscribe(obs_a);
        let _sub_b = publisher.subscribe(move |v: &i32| sink.borrow_mut().push(*v + 100));

        sub_a.unsubscribe();
        publisher.next(1);
        assert_eq!(*a.borrow(), vec![0, 100, 101]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let publisher = Publisher::new(0);
        {
            let _sub = publisher.subscribe(|_: &i32| {});
            assert_eq!(publisher.observer_count(), 1);
        }
        assert_eq!(publisher.observer_count(), 0);
    }

    #[test]
    fn observers_registered_during_next_wait_for_the_following_update() {
        let publisher = Rc::new(Publisher::new(0));
        let late_calls = Rc::new(Cell::new(0u32));
        let late_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let weak = Rc::downgrade(&publisher);
        let slot = Rc::clone(&late_sub);
        let counter = Rc::clone(&late_calls);
        let _first = publisher.subscribe(move |value: &i32| {
            let empty = slot.borrow().is_none();
            if *value == 1 && empty {
                if let Some(publisher) = weak.upgrade() {
                    let counter = Rc::clone(&counter);
                    let sub = publisher.subscribe(move |_| counter.set(counter.get() + 1));
                    *slot.borrow_mut() = Some(sub);
                }
            }
        });

        publisher.next(1);
        // Only the immediate delivery from subscribe().
        assert_eq!(late_calls.get(), 1);

        publisher.next(2);
        assert_eq!(late_calls.get(), 2);
    }

    #[test]
    fn observer_may_unsubscribe_itself_during_next() {
        let publisher = Publisher::new(0);
        let holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(Cell::new(0u32));

        let slot = Rc::clone(&holder);
        let counter = Rc::clone(&calls);
        let sub = publisher.subscribe(move |value: &i32| {
            counter.set(counter.get() + 1);
            if *value == 1 {
                if let Some(sub) = slot.borrow().as_ref() {
                    sub.unsubscribe();
                }
            }
        });
        *holder.borrow_mut() = Some(sub);

        publisher.next(1);
        publisher.next(2);
        assert_eq!(calls.get(), 2);
        assert_eq!(publisher.observer_count(), 0);
    }

    #[test]
    fn full_observer_receives_next_only() {
        struct Counting {
            nexts: Rc<Cell<u32>>,
        }
        impl Observer<i32> for Counting {
            fn next(&self, _value: &i32) {
                self.nexts.set(self.nexts.get() + 1);
            }
        }

        let nexts = Rc::new(Cell::new(0));
        let publisher = Publisher::new(1);
        let _sub = publisher.subscribe_observer(Counting {
            nexts: Rc::clone(&nexts),
        });
        publisher.next(2);
        assert_eq!(nexts.get(), 2);
    }

    #[test]
    fn replace_is_silent() {
        let publisher = Publisher::new(0);
        let (seen, observer) = recorder();
        let _sub = publisher.subscribe(observer);
        publisher.replace(9);
        assert_eq!(publisher.get(), 9);
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[test]
    fn get_returns_an_independent_copy() {
        let publisher = Publisher::new(vec![1, 2, 3]);
        let mut copy = publisher.get();
        copy.push(4);
        assert_eq!(publisher.get(), vec![1, 2, 3]);
        assert_eq!(publisher.with(Vec::len), 3);
    }

    #[test]
    fn subscription_outlives_publisher() {
        let sub;
        {
            let publisher = Publisher::new(0);
            sub = publisher.subscribe(|_: &i32| {});
        }
        sub.unsubscribe();
        assert!(!sub.is_subscribed());
    }

    #[test]
    fn debug_format() {
        let publisher = Publisher::new(42);
        let dbg = format!("{publisher:?}");
        assert!(dbg.contains("Publisher"));
        assert!(dbg.contains("42"));
    }
}
