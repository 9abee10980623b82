use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use vigil::engine::error::ErrorLike;
use vigil::engine::report::EntryKind;
use vigil::host::ManualHost;
use vigil::wrap::{run_guarded, BindContext, Callback, CallbackTable, FailureSink, Wrapper};

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(String, EntryKind, Option<BindContext>)>>,
}

impl RecordingSink {
    fn reports(&self) -> Vec<(String, EntryKind, Option<BindContext>)> {
        self.reports.lock().unwrap().clone()
    }
}

impl FailureSink for RecordingSink {
    fn failure(&self, raw: ErrorLike, kind: EntryKind, bind: Option<BindContext>) {
        let message = match raw {
            ErrorLike::Panic { message, .. } => message,
            ErrorLike::Value(v) => v.to_string(),
            ErrorLike::Canonical(e) => e.message,
            ErrorLike::Std(e) => e.to_string(),
        };
        self.reports.lock().unwrap().push((message, kind, bind));
    }
}

fn setup() -> (Wrapper, Arc<RecordingSink>) {
    let host = Arc::new(ManualHost::new());
    (Wrapper::new(host), Arc::new(RecordingSink::default()))
}

#[test]
fn wrapping_is_identity_stable() {
    let (wrapper, sink) = setup();
    let f: Callback = Arc::new(|| {});

    let w1 = wrapper.wrap(f.clone(), "timer", sink.clone());
    let w2 = wrapper.wrap(f.clone(), "timer", sink.clone());
    assert!(Arc::ptr_eq(&w1, &w2), "same original, same wrapper");

    // Wrapping a wrapper is a no-op.
    let w3 = wrapper.wrap(w1.clone(), "timer", sink);
    assert!(Arc::ptr_eq(&w3, &w1), "never double-wraps");
}

#[test]
fn wrapped_callable_behaves_like_the_original() {
    let (wrapper, sink) = setup();
    let calls = Arc::new(Mutex::new(0u32));
    let seen = calls.clone();
    let f: Callback = Arc::new(move || {
        *seen.lock().unwrap() += 1;
    });

    let wrapped = wrapper.wrap(f, "tick", sink.clone());
    wrapped();
    wrapped();

    assert_eq!(*calls.lock().unwrap(), 2, "invocation reaches the original");
    assert!(sink.reports().is_empty(), "no failure, no report");
}

#[test]
fn guarded_run_returns_the_result_unchanged() {
    let (_, sink) = setup();
    let result = run_guarded(|| 41 + 1, sink.as_ref(), EntryKind::Catch, None);
    assert_eq!(result, 42);
    assert!(sink.reports().is_empty());
}

#[test]
fn panic_is_reported_once_and_resumed_intact() {
    std::panic::set_hook(Box::new(|_| {}));
    let (wrapper, sink) = setup();
    let boom: Callback = Arc::new(|| panic!("exploded"));
    let wrapped = wrapper.wrap(boom, "handler", sink.clone());

    let outcome = catch_unwind(AssertUnwindSafe(|| wrapped()));
    let payload = outcome.expect_err("panic must propagate to the caller");
    assert_eq!(
        payload.downcast_ref::<&str>(),
        Some(&"exploded"),
        "original payload resumed, not a replacement"
    );

    let reports = sink.reports();
    assert_eq!(reports.len(), 1, "exactly one report per failure");
    let (message, kind, bind) = &reports[0];
    assert_eq!(message, "exploded");
    assert_eq!(*kind, EntryKind::Catch);
    assert_eq!(bind.as_ref().unwrap().context, "handler");
}

#[test]
fn bind_stack_is_captured_at_wrap_time_when_enabled() {
    std::panic::set_hook(Box::new(|_| {}));
    let host = Arc::new(ManualHost::new());
    host.set_now(7);
    let wrapper = Wrapper::new(host.clone());
    wrapper.set_capture_bind_stack(true);
    let sink = Arc::new(RecordingSink::default());

    let boom: Callback = Arc::new(|| panic!("late"));
    let wrapped = wrapper.wrap(boom, "listener", sink.clone());
    host.set_now(99); // time moves on before the callback fires

    let _ = catch_unwind(AssertUnwindSafe(|| wrapped()));
    let reports = sink.reports();
    let bind = reports[0].2.as_ref().unwrap();
    assert_eq!(bind.bound_at_ms, 7, "timestamp from wrap time, not call time");
    assert_eq!(
        bind.bind_stack.as_deref(),
        Some("manual-host synthetic stack"),
        "stack captured when the callback was registered"
    );
}

#[test]
fn cache_does_not_extend_the_original_lifetime() {
    let (wrapper, sink) = setup();
    let f: Callback = Arc::new(|| {});
    let weak_f = Arc::downgrade(&f);

    let wrapped = wrapper.wrap(f, "once", sink);
    drop(wrapped);
    assert!(
        weak_f.upgrade().is_none(),
        "dropping wrapper and original frees the original"
    );
}

#[test]
fn watch_all_wraps_in_place_and_skips_exclusions() {
    let (wrapper, sink) = setup();
    let mut table = CallbackTable::new();
    table.insert("on_open".to_string(), Arc::new(|| {}) as Callback);
    table.insert("on_close".to_string(), Arc::new(|| {}) as Callback);
    let open_before = table.get("on_open").unwrap().clone();
    let close_before = table.get("on_close").unwrap().clone();

    wrapper.wrap_all(&mut table, &["on_close"], &(sink as Arc<dyn FailureSink>));

    assert!(
        Arc::ptr_eq(table.get("on_close").unwrap(), &close_before),
        "excluded keys stay unwrapped"
    );
    assert!(
        !Arc::ptr_eq(table.get("on_open").unwrap(), &open_before),
        "non-excluded keys are replaced in place"
    );
}
