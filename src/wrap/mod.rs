use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::engine::error::{panic_text, ErrorLike};
use crate::engine::report::EntryKind;
use crate::host::Host;

/// A callable the engine can intercept. Host adapters pre-bind receiver
/// and arguments into the closure at registration time, so invoking the
/// wrapper is invoking the original, argument for argument.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Named registry of callbacks, for wholesale wrapping.
pub type CallbackTable = HashMap<String, Callback>;

/// Where wrapped callables deliver the failures they observe.
pub trait FailureSink: Send + Sync {
    fn failure(&self, raw: ErrorLike, kind: EntryKind, bind: Option<BindContext>);
}

/// Registration-site context attached to every failure a wrapper reports.
/// Captured when the callback is wrapped, not when it runs: this is the
/// "where was this registered" evidence that asynchronous dispatch loses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindContext {
    pub context: String,
    pub bound_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_stack: Option<String>,
}

struct Slot {
    original: Weak<dyn Fn() + Send + Sync>,
    wrapper: Weak<dyn Fn() + Send + Sync>,
}

/// Idempotent interception of callables.
///
/// The cache holds only weak references: a wrapper lives exactly as long
/// as someone holds it or its original, and the engine never extends the
/// original's lifetime.
pub struct Wrapper {
    host: Arc<dyn Host>,
    capture_bind_stack: AtomicBool,
    slots: Mutex<HashMap<usize, Slot>>,
    /// Callables this engine produced, so wrapping a wrapper is a no-op.
    produced: Mutex<HashMap<usize, Weak<dyn Fn() + Send + Sync>>>,
}

impl Wrapper {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            capture_bind_stack: AtomicBool::new(false),
            slots: Mutex::new(HashMap::new()),
            produced: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_capture_bind_stack(&self, enabled: bool) {
        self.capture_bind_stack.store(enabled, Ordering::Relaxed);
    }

    /// Wrap `cb` so that failures it raises are reported with kind
    /// `catch` before propagating unchanged.
    ///
    /// Identity-stable: wrapping the same callable twice returns the same
    /// wrapper, and wrapping a wrapper returns it as-is. If the cache is
    /// unavailable (poisoned lock), degrades to returning the original
    /// rather than failing the caller.
    pub fn wrap(&self, cb: Callback, context: &str, sink: Arc<dyn FailureSink>) -> Callback {
        let key = callable_key(&cb);

        {
            let Ok(mut produced) = self.produced.lock() else {
                return cb;
            };
            produced.retain(|_, wrapper| wrapper.strong_count() > 0);
            if produced.contains_key(&key) {
                return cb;
            }
        }

        let Ok(mut slots) = self.slots.lock() else {
            return cb;
        };
        // Dead originals free their address for reuse; prune before lookup.
        slots.retain(|_, slot| slot.original.strong_count() > 0);
        if let Some(slot) = slots.get(&key) {
            if let Some(existing) = slot.wrapper.upgrade() {
                return existing;
            }
        }

        let bind = BindContext {
            context: context.to_string(),
            bound_at_ms: self.host.now_ms(),
            bind_stack: self
                .capture_bind_stack
                .load(Ordering::Relaxed)
                .then(|| self.host.capture_stack()),
        };
        // The wrapper exclusively holds the original; the cache does not.
        let original = Arc::clone(&cb);
        let wrapper: Callback = Arc::new(move || {
            run_guarded(|| original(), sink.as_ref(), EntryKind::Catch, Some(&bind));
        });
        slots.insert(
            key,
            Slot {
                original: Arc::downgrade(&cb),
                wrapper: Arc::downgrade(&wrapper),
            },
        );
        drop(slots);

        if let Ok(mut produced) = self.produced.lock() {
            produced.insert(callable_key(&wrapper), Arc::downgrade(&wrapper));
        }
        wrapper
    }

    /// Wrap every callback in `table` in place, skipping excluded names.
    pub fn wrap_all(&self, table: &mut CallbackTable, excluded: &[&str], sink: &Arc<dyn FailureSink>) {
        for (name, cb) in table.iter_mut() {
            if excluded.contains(&name.as_str()) {
                continue;
            }
            *cb = self.wrap(Arc::clone(cb), name, Arc::clone(sink));
        }
    }
}

thread_local! {
    static GUARD_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// True while the current thread is inside a guarded section. The panic
/// hook surface consults this to leave panics alone that a wrapper is
/// already catching and reporting with richer bind context.
pub(crate) fn in_guarded_section() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

pub(crate) struct GuardedSection;

impl GuardedSection {
    pub(crate) fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        GuardedSection
    }
}

impl Drop for GuardedSection {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Guarded execution core: the result comes back unchanged; an unwind is
/// reported, then resumed with the original payload so downstream catch
/// sites observe exactly what the callable raised. Never swallows.
pub fn run_guarded<R>(
    f: impl FnOnce() -> R,
    sink: &dyn FailureSink,
    kind: EntryKind,
    bind: Option<&BindContext>,
) -> R {
    let _section = GuardedSection::enter();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let message = panic_text(payload.as_ref());
            sink.failure(
                ErrorLike::Panic {
                    message,
                    location: None,
                },
                kind,
                bind.cloned(),
            );
            resume_unwind(payload)
        }
    }
}

fn callable_key(cb: &Callback) -> usize {
    Arc::as_ptr(cb) as *const () as usize
}
