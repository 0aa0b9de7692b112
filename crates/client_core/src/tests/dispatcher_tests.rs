use super::*;
use std::{
    collections::HashMap,
    sync::atomic::AtomicUsize,
    thread,
};

#[derive(Default)]
struct Panel {
    title: String,
    enabled: bool,
    values: HashMap<usize, usize>,
}

const TITLE: Property<Panel, String> = Property::new(
    "title",
    |panel| panel.title.clone(),
    |panel, value| panel.title = value,
);

const ENABLED: Property<Panel, bool> = Property::new(
    "enabled",
    |panel| panel.enabled,
    |panel, value| panel.enabled = value,
);

const VALUE_COUNT: Property<Panel, usize> =
    Property::read_only("value_count", |panel| panel.values.len());

#[test]
fn executes_inline_on_affinity_thread() {
    let dispatcher = Dispatcher::new(Panel::default());
    assert!(dispatcher.is_affinity_thread());

    dispatcher
        .set_property(TITLE, "inline".to_string())
        .expect("set title");
    assert_eq!(dispatcher.get_property(TITLE).expect("get title"), "inline");
    // Nothing was queued, so there is nothing to pump.
    assert_eq!(dispatcher.pump().expect("pump"), 0);
}

#[test]
fn read_only_property_rejected_before_marshalling() {
    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();

    let err = dispatcher
        .set_property(VALUE_COUNT, 3)
        .expect_err("read-only property");
    assert!(matches!(err, DispatchError::ReadOnlyProperty("value_count")));
    assert!(!VALUE_COUNT.is_writable());
    assert_eq!(dispatcher.get_property(VALUE_COUNT).expect("get"), 0);
}

#[test]
fn off_thread_write_is_visible_when_call_returns() {
    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();
    assert!(!dispatcher.is_affinity_thread());

    dispatcher.set_property(ENABLED, true).expect("set enabled");
    assert!(dispatcher.get_property(ENABLED).expect("get enabled"));

    let ran_on_affinity = dispatcher
        .invoke_func(|panel| {
            panel.title = "marshalled".to_string();
            thread::current().name().map(str::to_string)
        })
        .expect("invoke func");
    assert_eq!(ran_on_affinity.as_deref(), Some("test-affinity"));
    assert_eq!(dispatcher.get_property(TITLE).expect("title"), "marshalled");
}

#[test]
fn concurrent_writers_observe_their_own_writes_and_last_write_wins() {
    const WRITERS: usize = 8;
    const WRITES_PER_KEY: usize = 200;

    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();

    let workers: Vec<_> = (0..WRITERS)
        .map(|key| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                for value in 0..WRITES_PER_KEY {
                    dispatcher
                        .invoke_action(move |panel| {
                            panel.values.insert(key, value);
                        })
                        .expect("write");
                    let observed = dispatcher
                        .invoke_func(move |panel| panel.values.get(&key).copied())
                        .expect("read");
                    assert_eq!(observed, Some(value), "torn read for key {key}");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("writer thread");
    }

    let snapshot = dispatcher
        .invoke_func(|panel| panel.values.clone())
        .expect("snapshot");
    assert_eq!(snapshot.len(), WRITERS);
    for key in 0..WRITERS {
        assert_eq!(snapshot[&key], WRITES_PER_KEY - 1);
    }
}

#[test]
fn single_thread_sequence_is_applied_in_order() {
    let affinity = Dispatcher::spawn("test-affinity", Vec::<u32>::new).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();

    for value in 0..50 {
        dispatcher
            .post(move |log| log.push(value))
            .expect("post");
    }
    let log = dispatcher.invoke_func(|log| log.clone()).expect("read log");
    assert_eq!(log, (0..50).collect::<Vec<_>>());
}

#[test]
fn nested_dispatch_on_affinity_thread_fails_instead_of_deadlocking() {
    let dispatcher = Dispatcher::new(0u32);
    let nested = dispatcher.clone();

    let inner = dispatcher
        .invoke_func(move |_| nested.invoke_func(|value| *value += 1))
        .expect("outer call");
    assert!(matches!(inner, Err(DispatchError::Reentrant)));
}

#[test]
fn panic_in_dispatched_call_is_returned_to_caller() {
    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();

    let err = dispatcher
        .invoke_action(|_| panic!("boom"))
        .expect_err("panic surfaces");
    match err {
        DispatchError::Panicked(message) => assert_eq!(message, "boom"),
        other => panic!("unexpected error: {other:?}"),
    }

    // The affinity thread survives and keeps serving calls.
    dispatcher.set_property(ENABLED, true).expect("set after panic");
    assert!(dispatcher.get_property(ENABLED).expect("get after panic"));
}

#[test]
fn posted_calls_wait_for_the_next_pump() {
    let dispatcher = Dispatcher::new(Panel::default());
    dispatcher
        .post(|panel| panel.title = "posted".to_string())
        .expect("post");
    assert_eq!(dispatcher.get_property(TITLE).expect("title"), "");

    assert_eq!(dispatcher.pump().expect("pump"), 1);
    assert_eq!(dispatcher.get_property(TITLE).expect("title"), "posted");
}

#[test]
fn pump_and_local_access_require_affinity_thread() {
    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();

    assert!(matches!(dispatcher.pump(), Err(DispatchError::WrongThread)));
    assert!(matches!(
        dispatcher.with_local(|panel| panel.enabled),
        Err(DispatchError::WrongThread)
    ));
    assert!(matches!(dispatcher.shutdown(), Err(DispatchError::WrongThread)));
}

#[test]
fn waker_runs_when_work_is_queued() {
    let dispatcher = Dispatcher::new(Panel::default());
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wakes);
    assert!(dispatcher.set_waker(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(!dispatcher.set_waker(|| {}));

    dispatcher.post(|panel| panel.enabled = true).expect("post");
    dispatcher.post(|panel| panel.enabled = false).expect("post");
    assert_eq!(wakes.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.pump().expect("pump"), 2);
}

#[test]
fn calls_after_shutdown_are_disconnected() {
    let affinity = Dispatcher::spawn("test-affinity", Panel::default).expect("spawn");
    let dispatcher = affinity.dispatcher().clone();
    dispatcher.set_property(ENABLED, true).expect("set before shutdown");

    affinity.shutdown();

    assert!(dispatcher.is_shut_down());
    assert!(matches!(
        dispatcher.set_property(ENABLED, false),
        Err(DispatchError::Disconnected)
    ));
    assert!(matches!(
        dispatcher.post(|panel| panel.enabled = false),
        Err(DispatchError::Disconnected)
    ));
}
