#![forbid(unsafe_code)]

//! Stable sorting stage.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use refract_core::{ComplexStage, ProcessorCore, Stage, StageId, Subscription};

use crate::entry::{Entry, compare_values};

type Comparator<E> = Rc<dyn Fn(&E, &E) -> Ordering>;

/// Sort direction. Descending reverses whatever comparator is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// One link of a [`Sorter::Chain`].
pub enum SortKey<E> {
    /// The entry's own [`Entry::compare`].
    Natural,
    /// Compare a named field; null fields sort last.
    Property(String),
    Comparator(Comparator<E>),
}

impl<E> SortKey<E> {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn comparator(f: impl Fn(&E, &E) -> Ordering + 'static) -> Self {
        Self::Comparator(Rc::new(f))
    }
}

impl<E: Entry + 'static> SortKey<E> {
    fn resolve(&self) -> Comparator<E> {
        match self {
            Self::Natural => Rc::new(|a: &E, b: &E| a.compare(b)),
            Self::Property(name) => {
                let name = name.clone();
                Rc::new(move |a: &E, b: &E| compare_values(&a.field(&name), &b.field(&name)))
            }
            Self::Comparator(f) => Rc::clone(f),
        }
    }
}

impl<E> Clone for SortKey<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Natural => Self::Natural,
            Self::Property(name) => Self::Property(name.clone()),
            Self::Comparator(f) => Self::Comparator(Rc::clone(f)),
        }
    }
}

impl<E> fmt::Debug for SortKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural => f.write_str("Natural"),
            Self::Property(name) => f.debug_tuple("Property").field(name).finish(),
            Self::Comparator(_) => f.write_str("Comparator(..)"),
        }
    }
}

/// How a [`SortStage`] orders entries.
pub enum Sorter<E> {
    /// Natural ordering; also sets the stage's direction.
    Natural(SortDirection),
    Property(String),
    Comparator(Comparator<E>),
    /// Keys applied in order; later keys break ties of earlier ones.
    Chain(Vec<SortKey<E>>),
}

impl<E> Sorter<E> {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn comparator(f: impl Fn(&E, &E) -> Ordering + 'static) -> Self {
        Self::Comparator(Rc::new(f))
    }

    pub fn chain(keys: impl IntoIterator<Item = SortKey<E>>) -> Self {
        Self::Chain(keys.into_iter().collect())
    }
}

impl<E: Entry + 'static> Sorter<E> {
    /// Resolve into a single undirected comparator.
    fn resolve(&self) -> Comparator<E> {
        match self {
            Self::Natural(_) => SortKey::Natural.resolve(),
            Self::Property(name) => SortKey::Property(name.clone()).resolve(),
            Self::Comparator(f) => Rc::clone(f),
            Self::Chain(keys) => {
                let comparators: Vec<Comparator<E>> = keys.iter().map(SortKey::resolve).collect();
                Rc::new(move |a: &E, b: &E| {
                    comparators
                        .iter()
                        .map(|compare| compare(a, b))
                        .find(|ordering| ordering.is_ne())
                        .unwrap_or(Ordering::Equal)
                })
            }
        }
    }
}

impl<E> Clone for Sorter<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Natural(direction) => Self::Natural(*direction),
            Self::Property(name) => Self::Property(name.clone()),
            Self::Comparator(f) => Self::Comparator(Rc::clone(f)),
            Self::Chain(keys) => Self::Chain(keys.clone()),
        }
    }
}

impl<E> fmt::Debug for Sorter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural(direction) => f.debug_tuple("Natural").field(direction).finish(),
            Self::Property(name) => f.debug_tuple("Property").field(name).finish(),
            Self::Comparator(_) => f.write_str("Comparator(..)"),
            Self::Chain(keys) => f.debug_tuple("Chain").field(keys).finish(),
        }
    }
}

struct SortInner<E> {
    core: ProcessorCore<Vec<E>>,
    sorter: RefCell<Option<Sorter<E>>>,
    comparator: RefCell<Option<Comparator<E>>>,
    direction: Cell<SortDirection>,
}

/// Sorts entries with a [`Sorter`]. The sort is stable: entries that compare
/// equal keep their input order in either direction. Without a sorter the
/// stage passes its input through.
///
/// Cloning creates a new handle to the same stage.
pub struct SortStage<E> {
    inner: Rc<SortInner<E>>,
}

impl<E: Entry + Clone + 'static> SortStage<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_active(true)
    }

    #[must_use]
    pub fn with_active(active: bool) -> Self {
        Self {
            inner: Rc::new(SortInner {
                core: ProcessorCore::new(Vec::new(), active),
                sorter: RefCell::new(None),
                comparator: RefCell::new(None),
                direction: Cell::new(SortDirection::Ascending),
            }),
        }
    }

    #[must_use]
    pub fn sorter(&self) -> Option<Sorter<E>> {
        self.inner.sorter.borrow().clone()
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.inner.direction.get()
    }

    /// Replace the sorter and re-run against the last input.
    pub fn set_sorter(&self, sorter: Option<Sorter<E>>) -> Vec<E> {
        tracing::debug!(message = "sort.set", stage = self.inner.core.id().raw(), sorter = ?sorter);
        if let Some(Sorter::Natural(direction)) = &sorter {
            self.inner.direction.set(*direction);
        }
        *self.inner.comparator.borrow_mut() = sorter.as_ref().map(Sorter::resolve);
        *self.inner.sorter.borrow_mut() = sorter;
        self.reprocess(false)
    }

    /// Change the direction. Setting the current direction does nothing.
    pub fn set_direction(&self, direction: SortDirection) -> Vec<E> {
        if self.inner.direction.get() == direction {
            return self.get();
        }
        tracing::debug!(
            message = "sort.direction",
            stage = self.inner.core.id().raw(),
            direction = ?direction
        );
        self.inner.direction.set(direction);
        self.reprocess(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.core.with_value(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.core.with_value(Vec::is_empty)
    }
}

impl<E: Entry + Clone + 'static> Default for SortStage<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for SortStage<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for SortStage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortStage")
            .field("core", &self.inner.core)
            .field("sorter", &self.inner.sorter.borrow())
            .field("direction", &self.inner.direction.get())
            .finish()
    }
}

impl<E: Entry + Clone + 'static> ComplexStage<Vec<E>> for SortStage<E> {
    fn core(&self) -> &ProcessorCore<Vec<E>> {
        &self.inner.core
    }

    fn transform(&self, mut input: Vec<E>) -> Vec<E> {
        let comparator = self.inner.comparator.borrow().clone();
        if let Some(compare) = comparator {
            let direction = self.inner.direction.get();
            input.sort_by(|a, b| direction.apply(compare(a, b)));
        }
        input
    }
}

impl<E: Entry + Clone + 'static> Stage<Vec<E>> for SortStage<E> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn names(rows: &[Value]) -> Vec<&str> {
        rows.iter().filter_map(|row| row["name"].as_str()).collect()
    }

    #[test]
    fn natural_sort_sets_direction() {
        let stage = SortStage::new();
        stage.process(vec![3, 1, 2], false);
        assert_eq!(
            stage.set_sorter(Some(Sorter::Natural(SortDirection::Ascending))),
            vec![1, 2, 3]
        );
        assert_eq!(
            stage.set_sorter(Some(Sorter::Natural(SortDirection::Descending))),
            vec![3, 2, 1]
        );
        assert_eq!(stage.direction(), SortDirection::Descending);
    }

    #[test]
    fn property_sort_puts_nulls_last_then_applies_direction() {
        let rows = vec![
            json!({"name": "c", "rank": 2}),
            json!({"name": "a"}),
            json!({"name": "b", "rank": 1}),
        ];
        let stage = SortStage::new();
        stage.process(rows, false);

        let ascending = stage.set_sorter(Some(Sorter::property("rank")));
        assert_eq!(names(&ascending), ["b", "c", "a"]);
        let descending = stage.set_direction(SortDirection::Descending);
        assert_eq!(names(&descending), ["a", "c", "b"]);
    }

    #[test]
    fn equal_keys_keep_input_order_in_both_directions() {
        let rows = vec![
            json!({"name": "x1", "k": 1}),
            json!({"name": "y0", "k": 0}),
            json!({"name": "x2", "k": 1}),
            json!({"name": "y1", "k": 0}),
        ];
        let stage = SortStage::new();
        stage.process(rows, false);
        let up = stage.set_sorter(Some(Sorter::property("k")));
        assert_eq!(names(&up), ["y0", "y1", "x1", "x2"]);
        let down = stage.set_direction(SortDirection::Descending);
        assert_eq!(names(&down), ["x1", "x2", "y0", "y1"]);
    }

    #[test]
    fn chain_breaks_ties_with_later_keys() {
        let rows = vec![
            json!({"name": "b", "group": 1}),
            json!({"name": "a", "group": 2}),
            json!({"name": "a", "group": 1}),
        ];
        let stage = SortStage::new();
        stage.process(rows, false);
        let sorted = stage.set_sorter(Some(Sorter::chain([
            SortKey::property("name"),
            SortKey::comparator(|a: &Value, b: &Value| {
                compare_values(&b["group"], &a["group"])
            }),
        ])));
        let pairs: Vec<(&str, i64)> = sorted
            .iter()
            .map(|row| (row["name"].as_str().unwrap_or(""), row["group"].as_i64().unwrap_or(0)))
            .collect();
        assert_eq!(pairs, [("a", 2), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn unchanged_direction_does_not_reprocess() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let stage = SortStage::new();
        stage.process(vec![2, 1], false);
        stage.set_sorter(Some(Sorter::comparator(move |a: &i32, b: &i32| {
            counter.set(counter.get() + 1);
            a.cmp(b)
        })));
        let before = calls.get();
        assert_eq!(stage.set_direction(SortDirection::Ascending), vec![1, 2]);
        assert_eq!(calls.get(), before);
    }

    #[test]
    fn clearing_the_sorter_passes_input_through() {
        let stage = SortStage::new();
        stage.process(vec![2, 3, 1], false);
        stage.set_sorter(Some(Sorter::Natural(SortDirection::Ascending)));
        assert_eq!(stage.set_sorter(None), vec![2, 3, 1]);
    }
}
