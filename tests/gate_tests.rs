use vigil::engine::error::CanonicalError;
use vigil::engine::gate::{Admission, Gate, FINGERPRINT_MAX_CHARS, MAX_PER_WINDOW};

fn error(message: &str) -> CanonicalError {
    CanonicalError::new("Error", message)
}

#[test]
fn consecutive_duplicates_are_suppressed() {
    let gate = Gate::new();
    let e = error("boom");

    assert!(matches!(gate.admit(&e, 0, true), Admission::Admitted { .. }));
    assert_eq!(gate.admit(&e, 50, true), Admission::Duplicate);
    assert_eq!(gate.admit(&e, 90, true), Admission::Duplicate);
}

#[test]
fn dedup_remembers_only_the_last_admitted_fingerprint() {
    let gate = Gate::new();
    let a = error("alpha");
    let b = error("beta");

    assert!(matches!(gate.admit(&a, 0, true), Admission::Admitted { .. }));
    assert!(matches!(gate.admit(&b, 10, true), Admission::Admitted { .. }));
    // Non-adjacent repeat of `a` is admitted again: no historical set.
    assert!(matches!(gate.admit(&a, 20, true), Admission::Admitted { .. }));
}

#[test]
fn dedup_off_admits_identical_reports() {
    let gate = Gate::new();
    let e = error("same");
    assert!(matches!(gate.admit(&e, 0, false), Admission::Admitted { .. }));
    assert!(matches!(gate.admit(&e, 1, false), Admission::Admitted { .. }));
}

#[test]
fn fingerprint_covers_stack_lineage() {
    let gate = Gate::new();
    let mut first = error("same message");
    first.stack = Some("stack-a".to_string());
    let mut second = error("same message");
    second.stack = Some("stack-b".to_string());

    assert!(matches!(gate.admit(&first, 0, true), Admission::Admitted { .. }));
    assert!(
        matches!(gate.admit(&second, 1, true), Admission::Admitted { .. }),
        "different stacks are different failures"
    );
}

#[test]
fn eleventh_attempt_in_a_window_is_throttled() {
    let gate = Gate::new();
    let mut admitted = 0;
    let mut throttled = 0;
    for i in 0..=MAX_PER_WINDOW {
        match gate.admit(&error(&format!("distinct-{i}")), 100, false) {
            Admission::Admitted { .. } => admitted += 1,
            Admission::Throttled => throttled += 1,
            Admission::Duplicate => panic!("dedup disabled"),
        }
    }
    assert_eq!(admitted, MAX_PER_WINDOW);
    assert_eq!(throttled, 1);
}

#[test]
fn new_window_resets_and_annotates_suppressed_count() {
    let gate = Gate::new();
    for i in 0..13 {
        let _ = gate.admit(&error(&format!("storm-{i}")), 100, false);
    }

    // 1s later: counters reset, the opening report carries the overflow.
    match gate.admit(&error("after the storm"), 1_200, false) {
        Admission::Admitted { suppressed } => {
            assert_eq!(suppressed, 3, "three attempts were throttled last window")
        }
        other => panic!("expected admission, got {other:?}"),
    }

    // Consumed once, not repeated on the next report.
    match gate.admit(&error("second of window"), 1_300, false) {
        Admission::Admitted { suppressed } => assert_eq!(suppressed, 0),
        other => panic!("expected admission, got {other:?}"),
    }
}

#[test]
fn oversized_fingerprints_compare_on_a_bounded_prefix() {
    let gate = Gate::new();
    let base = "x".repeat(FINGERPRINT_MAX_CHARS);
    let first = error(&format!("{base}-tail-one"));
    let second = error(&format!("{base}-tail-two"));

    assert!(matches!(gate.admit(&first, 0, true), Admission::Admitted { .. }));
    // Identical within the bounded prefix: treated as the same failure.
    assert_eq!(gate.admit(&second, 1, true), Admission::Duplicate);
}
