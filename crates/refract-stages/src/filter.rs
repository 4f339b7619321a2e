#![forbid(unsafe_code)]

//! Sub-sequence selection stage.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use refract_core::{ComplexStage, ProcessorCore, Stage, StageId, Subscription};
use serde_json::Value;

use crate::entry::Entry;

type Predicate<E> = Rc<dyn Fn(&E) -> bool>;

/// What a [`FilterStage`] keeps.
pub enum Filter<E> {
    /// `true` keeps truthy entries, `false` keeps falsy ones.
    Truthy(bool),
    /// Keep entries whose named field is truthy.
    Property(String),
    /// Keep entries whose named field equals `value`.
    PropertyValue { property: String, value: Value },
    Predicate(Predicate<E>),
}

impl<E> Filter<E> {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn property_value(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::PropertyValue {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn predicate(f: impl Fn(&E) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }
}

impl<E: Entry + 'static> Filter<E> {
    /// Resolve the configuration into a single predicate.
    fn resolve(&self) -> Predicate<E> {
        match self {
            Self::Truthy(keep) => {
                let keep = *keep;
                Rc::new(move |entry: &E| entry.is_truthy() == keep)
            }
            Self::Property(name) => {
                let name = name.clone();
                Rc::new(move |entry: &E| entry.field(&name).is_truthy())
            }
            Self::PropertyValue { property, value } => {
                let (property, value) = (property.clone(), value.clone());
                Rc::new(move |entry: &E| entry.field(&property) == value)
            }
            Self::Predicate(f) => Rc::clone(f),
        }
    }
}

impl<E> Clone for Filter<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Truthy(keep) => Self::Truthy(*keep),
            Self::Property(name) => Self::Property(name.clone()),
            Self::PropertyValue { property, value } => Self::PropertyValue {
                property: property.clone(),
                value: value.clone(),
            },
            Self::Predicate(f) => Self::Predicate(Rc::clone(f)),
        }
    }
}

impl<E> fmt::Debug for Filter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truthy(keep) => f.debug_tuple("Truthy").field(keep).finish(),
            Self::Property(name) => f.debug_tuple("Property").field(name).finish(),
            Self::PropertyValue { property, value } => f
                .debug_struct("PropertyValue")
                .field("property", property)
                .field("value", value)
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

struct FilterInner<E> {
    core: ProcessorCore<Vec<E>>,
    filter: RefCell<Option<Filter<E>>>,
    predicate: RefCell<Option<Predicate<E>>>,
}

/// Keeps the entries matching a [`Filter`], preserving their order.
/// Without a filter the stage passes its input through.
///
/// Cloning creates a new handle to the same stage.
pub struct FilterStage<E> {
    inner: Rc<FilterInner<E>>,
}

impl<E: Entry + Clone + 'static> FilterStage<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_active(true)
    }

    #[must_use]
    pub fn with_active(active: bool) -> Self {
        Self {
            inner: Rc::new(FilterInner {
                core: ProcessorCore::new(Vec::new(), active),
                filter: RefCell::new(None),
                predicate: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn filter(&self) -> Option<Filter<E>> {
        self.inner.filter.borrow().clone()
    }

    /// Replace the filter and re-run against the last input.
    pub fn set_filter(&self, filter: Option<Filter<E>>) -> Vec<E> {
        tracing::debug!(
            message = "filter.set",
            stage = self.inner.core.id().raw(),
            filter = ?filter
        );
        *self.inner.predicate.borrow_mut() = filter.as_ref().map(Filter::resolve);
        *self.inner.filter.borrow_mut() = filter;
        self.reprocess(false)
    }

    /// Number of entries in the current output.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.core.with_value(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.core.with_value(Vec::is_empty)
    }
}

impl<E: Entry + Clone + 'static> Default for FilterStage<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for FilterStage<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for FilterStage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("core", &self.inner.core)
            .field("filter", &self.inner.filter.borrow())
            .finish()
    }
}

impl<E: Entry + Clone + 'static> ComplexStage<Vec<E>> for FilterStage<E> {
    fn core(&self) -> &ProcessorCore<Vec<E>> {
        &self.inner.core
    }

    fn transform(&self, input: Vec<E>) -> Vec<E> {
        let predicate = self.inner.predicate.borrow().clone();
        match predicate {
            Some(keep) => input.into_iter().filter(|entry| keep(entry)).collect(),
            None => input,
        }
    }
}

impl<E: Entry + Clone + 'static> Stage<Vec<E>> for FilterStage<E> {
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
