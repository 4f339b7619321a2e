#![forbid(unsafe_code)]

//! End-to-end tests through the public facade.
//!
//! Each test drives a full source → preprocessors → processors → observer
//! pipeline and checks what an observer or caller actually sees.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use refract::prelude::*;
use serde_json::{Value, json};
use tracing_test::traced_test;

// ── Helpers ──────────────────────────────────────────────────────────

fn counting(
    calls: &Rc<Cell<u32>>,
    transform: impl Fn(i32) -> i32 + 'static,
) -> Processor<Vec<i32>> {
    let calls = Rc::clone(calls);
    Processor::new(Vec::new(), move |v: Vec<i32>| {
        calls.set(calls.get() + 1);
        v.into_iter().map(&transform).collect()
    })
}

fn recorder<T: Clone + 'static>(source: &DataSource<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = source.subscribe(move |v: &T| sink.borrow_mut().push(v.clone()));
    (seen, sub)
}

// ═════════════════════════════════════════════════════════════════════════
// Snapshots
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn snapshots_never_alias_the_source() {
    let table = TableDataSource::new(vec![3, 1, 2]);
    let mut first = table.get();
    first.clear();

    let (seen, _sub) = recorder::<Vec<i32>>(&table);
    seen.borrow_mut()[0].push(99);

    assert_eq!(table.get(), vec![3, 1, 2]);
    assert_eq!(table.len(), 3);
}

#[test]
fn subscribers_get_the_current_value_immediately() {
    let table = TableDataSource::new(vec![1, 2]);
    let (seen, _sub) = recorder::<Vec<i32>>(&table);
    assert_eq!(*seen.borrow(), vec![vec![1, 2]]);

    table.push(3);
    assert_eq!(*seen.borrow(), vec![vec![1, 2], vec![1, 2, 3]]);
}

#[test]
fn dropping_the_subscription_stops_delivery() {
    let source = ArrayDataSource::new(vec![1]);
    let (seen, sub) = recorder::<Vec<i32>>(&source);
    assert_eq!(source.observer_count(), 1);
    drop(sub);

    source.push(2);
    assert_eq!(source.observer_count(), 0);
    assert_eq!(seen.borrow().len(), 1);
}

// ═════════════════════════════════════════════════════════════════════════
// Change propagation
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn changing_a_middle_processor_reruns_only_it_and_later_stages() {
    let source = ArrayDataSource::new(vec![1, 2, 3]);
    let (a_calls, b_calls, c_calls) = (
        Rc::new(Cell::new(0)),
        Rc::new(Cell::new(0)),
        Rc::new(Cell::new(0)),
    );
    let factor = Rc::new(Cell::new(10));
    let a = counting(&a_calls, |x| x + 1);
    let b = {
        let factor = Rc::clone(&factor);
        counting(&b_calls, move |x| x * factor.get())
    };
    let c = counting(&c_calls, |x| x - 1);
    source.add_processor(a);
    source.add_processor(b.clone());
    source.add_processor(c);
    assert_eq!(source.get(), vec![19, 29, 39]);

    let before = (a_calls.get(), b_calls.get(), c_calls.get());
    factor.set(100);
    b.reprocess(false);

    assert_eq!(source.get(), vec![199, 299, 399]);
    assert_eq!(a_calls.get(), before.0);
    assert_eq!(b_calls.get(), before.1 + 1);
    assert_eq!(c_calls.get(), before.2 + 1);
}

#[test]
fn deactivate_and_reactivate_are_idempotent() {
    let source = DataSource::new(vec![1, 2]);
    let double = Processor::new(Vec::new(), |v: Vec<i32>| v.into_iter().map(|x| x * 2).collect());
    source.add_processor(double.clone());
    let original = source.get();

    double.set_active(false);
    assert_eq!(source.get(), vec![1, 2]);
    double.set_active(false);
    assert_eq!(source.get(), vec![1, 2]);

    double.set_active(true);
    double.set_active(true);
    assert_eq!(source.get(), original);
}

#[test]
fn add_then_remove_restores_the_value() {
    let table = TableDataSource::new(vec![4, 5, 6]);
    let before = table.get();
    let reverse = FnStage::new(|mut v: Vec<i32>| {
        v.reverse();
        v
    });
    assert_eq!(table.add_processor(reverse.clone()), vec![6, 5, 4]);
    assert_eq!(table.remove_processor(&reverse), before);
    assert_eq!(table.processor_count(), 0);
}

#[test]
fn reentrant_set_from_an_observer_terminates() {
    let source = DataSource::new(0);
    let slot: Rc<RefCell<Option<DataSource<i32>>>> = Rc::new(RefCell::new(None));
    *slot.borrow_mut() = Some(source.clone());
    let seen = Rc::new(RefCell::new(Vec::new()));

    let handle = Rc::clone(&slot);
    let sink = Rc::clone(&seen);
    let _sub = source.subscribe(move |value: &i32| {
        sink.borrow_mut().push(*value);
        let source = handle.borrow().clone();
        if let Some(source) = source.filter(|_| value % 2 != 0) {
            source.set(value + 1);
        }
    });
    let after_subscribe = seen.borrow().len();

    source.set(101);
    assert_eq!(seen.borrow().len(), after_subscribe + 2);
    assert_eq!(source.get(), 102);
    assert_eq!(seen.borrow().last(), Some(&source.get()));
    slot.borrow_mut().take();
}

#[test]
fn observer_toggling_a_processor_reaches_every_observer() {
    let source = DataSource::new(vec![1, 2, 3]);
    let double = Processor::new(Vec::new(), |v: Vec<i32>| v.into_iter().map(|x| x * 2).collect());
    source.add_processor(double.clone());

    let toggle = double.clone();
    let _toggler = source.subscribe(move |value: &Vec<i32>| {
        if value.iter().sum::<i32>() > 20 {
            toggle.set_active(false);
        }
    });
    let (seen, _sub) = recorder::<Vec<i32>>(&source);

    source.set(vec![5, 6]);
    assert_eq!(source.get(), vec![5, 6]);
    assert_eq!(*seen.borrow(), vec![vec![2, 4, 6], vec![10, 12], vec![5, 6]]);
    assert!(!double.is_active());
}

#[test]
fn observer_enabling_the_filter_reaches_every_observer() {
    let config = TableConfig::default().with_filtering(false);
    let rows: Vec<i32> = (1..=6).collect();
    let table = TableDataSource::with_config(rows, config).expect("valid config");
    table
        .filtering()
        .set_filter(Some(Filter::predicate(|x: &i32| x % 2 == 0)));
    let (seen, _sub) = recorder::<Vec<i32>>(&table);

    let filter = table.filtering().clone();
    let _toggler = table.subscribe(move |rows: &Vec<i32>| {
        if rows.len() > 3 {
            filter.set_active(true);
        }
    });
    assert_eq!(table.get(), vec![2, 4, 6]);
    assert_eq!(seen.borrow().last(), Some(&table.get()));

    table.push(8);
    assert_eq!(table.get(), vec![2, 4, 6, 8]);
    assert_eq!(seen.borrow().last(), Some(&table.get()));
    assert!(table.filtering().is_active());
}

// ═════════════════════════════════════════════════════════════════════════
// Built-in stages
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn pager_boundaries() {
    let config = TableConfig::default().with_page(PageConfig::default().with_page_size(3));
    let table = TableDataSource::with_config(vec![1, 2, 3, 4, 5], config).expect("valid config");
    assert_eq!(table.get(), vec![1, 2, 3]);

    table.paging().set_page(2).expect("page 2");
    assert_eq!(table.get(), vec![4, 5]);

    table.paging().set_page(3).expect("page 3");
    assert!(table.get().is_empty());

    assert_eq!(
        table.paging().set_page(0),
        Err(PipelineError::InvalidPage { page: 0 })
    );
}

#[test]
fn truthy_filter_over_json_values() {
    let rows = vec![json!(0), json!(""), Value::Null, json!(false), json!(1), json!("a")];
    let table = TableDataSource::new(rows);
    table.filtering().set_filter(Some(Filter::Truthy(true)));
    assert_eq!(table.get(), vec![json!(1), json!("a")]);

    table.filtering().set_filter(None);
    assert_eq!(table.get().len(), 6);
}

#[test]
fn property_filter_then_sort_then_page() {
    let rows = vec![
        json!({"name": "ada", "admin": true, "age": 36}),
        json!({"name": "bob", "admin": false, "age": 25}),
        json!({"name": "cy", "admin": true, "age": 19}),
        json!({"name": "di", "admin": true}),
    ];
    let config = TableConfig::default().with_page(PageConfig::default().with_page_size(2));
    let table = TableDataSource::with_config(rows, config).expect("valid config");
    table.filtering().set_filter(Some(Filter::property("admin")));
    table.sorting().set_sorter(Some(Sorter::property("age")));

    let names = |rows: Vec<Value>| -> Vec<String> {
        rows.iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_owned())
            .collect()
    };
    assert_eq!(names(table.get()), vec!["cy", "ada"]);

    table.paging().set_page(2).expect("page 2");
    assert_eq!(names(table.get()), vec!["di"]);

    table.sorting().set_direction(SortDirection::Descending);
    assert_eq!(names(table.paging().get()), vec!["cy"]);
}

#[test]
#[traced_test]
fn table_activity_is_logged() {
    let table = TableDataSource::new(vec![2, 1]);
    table.sorting().set_sorter(Some(Sorter::Natural(SortDirection::Ascending)));
    table.set(vec![3]);
    assert!(logs_contain("table.new"));
    assert!(logs_contain("sort.set"));
    assert!(logs_contain("source.set"));
}
