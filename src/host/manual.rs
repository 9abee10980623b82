use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::Host;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Test host with a stepped clock and an explicit deferred-job queue.
/// Nothing runs until the test calls `run_deferred`, which makes the
/// engine's zero-delay reentrancy breaks observable and deterministic.
pub struct ManualHost {
    now: AtomicU64,
    deferred: Mutex<VecDeque<Job>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
            deferred: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_now(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Run every job deferred so far, in FIFO order. Jobs enqueued while
    /// draining run in the same pass. Returns how many jobs ran.
    pub fn run_deferred(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = {
                let mut queue = self.deferred.lock().expect("deferred queue poisoned");
                queue.pop_front()
            };
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.lock().expect("deferred queue poisoned").len()
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for ManualHost {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn capture_stack(&self) -> String {
        // Deterministic on purpose: fingerprints built from identical
        // errors must compare equal regardless of the stepped clock.
        "manual-host synthetic stack".to_string()
    }

    fn defer(&self, job: Job) {
        self.deferred
            .lock()
            .expect("deferred queue poisoned")
            .push_back(job);
    }
}
