#![forbid(unsafe_code)]

//! How the built-in stages look inside list entries.
//!
//! The filter and sort shorthands need three things from an entry: whether
//! it counts as "truthy", the value of a named field, and a natural ordering.
//! [`Entry`] provides them. Fields are read as [`serde_json::Value`] so that
//! records of any shape can be compared without knowing their type.

use std::cmp::Ordering;

use serde_json::Value;

/// An inspectable list entry.
pub trait Entry {
    /// `false` for the "empty" value of the type (zero, empty string, `false`,
    /// null, NaN), `true` otherwise.
    fn is_truthy(&self) -> bool;

    /// The value of the named field, or `Value::Null` if there is none.
    fn field(&self, _name: &str) -> Value {
        Value::Null
    }

    /// Natural ordering used by [`Sorter::Natural`](crate::Sorter::Natural).
    fn compare(&self, other: &Self) -> Ordering;
}

/// Relational comparison of two field values.
///
/// `Null` orders after every other value. Numbers compare numerically,
/// strings lexically, booleans `false < true`. Values of different kinds
/// order by kind: `Bool < Number < String < Array < Object`. Arrays compare
/// equal to arrays, objects to objects.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Truthiness of a field value.
#[must_use]
pub fn value_is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Entry for Value {
    fn is_truthy(&self) -> bool {
        value_is_truthy(self)
    }

    fn field(&self, name: &str) -> Value {
        match self {
            Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
            Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        compare_values(self, other)
    }
}

impl Entry for bool {
    fn is_truthy(&self) -> bool {
        *self
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

macro_rules! impl_entry_int {
    ($($ty:ty),*) => {
        $(
            impl Entry for $ty {
                fn is_truthy(&self) -> bool {
                    *self != 0
                }

                fn compare(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_entry_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_entry_float {
    ($($ty:ty),*) => {
        $(
            impl Entry for $ty {
                fn is_truthy(&self) -> bool {
                    *self != 0.0 && !self.is_nan()
                }

                fn compare(&self, other: &Self) -> Ordering {
                    self.partial_cmp(other).unwrap_or(Ordering::Equal)
                }
            }
        )*
    };
}

impl_entry_float!(f32, f64);

impl Entry for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Entry for &'static str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// `None` is falsy, has no fields and orders after every `Some`.
impl<E: Entry> Entry for Option<E> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Entry::is_truthy)
    }

    fn field(&self, name: &str) -> Value {
        self.as_ref().map_or(Value::Null, |entry| entry.field(name))
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Some(a), Some(b)) => a.compare(b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        }
    }
}
