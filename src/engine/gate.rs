use std::sync::Mutex;

use tracing::debug;

use super::error::CanonicalError;

pub const WINDOW_MS: u64 = 1_000;
pub const MAX_PER_WINDOW: u32 = 10;
/// Fingerprints compare on at most this many characters of message+stack.
pub const FINGERPRINT_MAX_CHARS: usize = 10_000;

/// Gate verdict for one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted; `suppressed` is how many attempts the previous window
    /// throttled, annotated onto the report that opens a new window.
    Admitted { suppressed: u32 },
    /// Identical to the immediately preceding admitted fingerprint.
    Duplicate,
    /// Over the per-window budget.
    Throttled,
}

#[derive(Debug, Default)]
struct GateState {
    window_start: u64,
    attempts: u32,
    throttled: u32,
    /// Carried from the window that just closed, consumed by the next
    /// admitted report.
    pending_suppressed: u32,
    last_fingerprint: Option<String>,
}

/// Backpressure for the report path: consecutive-duplicate suppression
/// plus a rolling one-second rate limit. Trades completeness of telemetry
/// for bounded outbound volume during error storms.
#[derive(Debug)]
pub struct Gate {
    state: Mutex<GateState>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
        }
    }

    /// Called once per normalized error, before any expensive work.
    /// `dedupe` mirrors the installed configuration.
    pub fn admit(&self, error: &CanonicalError, now_ms: u64, dedupe: bool) -> Admission {
        // A poisoned gate must not take the report path down with it;
        // keep going with whatever state the poisoner left.
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if now_ms.saturating_sub(state.window_start) >= WINDOW_MS {
            state.pending_suppressed = state.throttled;
            state.window_start = now_ms;
            state.attempts = 0;
            state.throttled = 0;
        }

        let fingerprint = dedupe.then(|| fingerprint(error));
        if let Some(fp) = &fingerprint {
            if state.last_fingerprint.as_deref() == Some(fp.as_str()) {
                debug!(target: "vigil::gate", "consecutive duplicate suppressed");
                return Admission::Duplicate;
            }
        }

        state.attempts += 1;
        if state.attempts > MAX_PER_WINDOW {
            state.throttled += 1;
            debug!(target: "vigil::gate", throttled = state.throttled, "rate limit hit");
            return Admission::Throttled;
        }

        // Only admitted reports move the dedup reference point.
        if let Some(fp) = fingerprint {
            state.last_fingerprint = Some(fp);
        }
        let suppressed = std::mem::take(&mut state.pending_suppressed);
        Admission::Admitted { suppressed }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint(error: &CanonicalError) -> String {
    let source = error.fingerprint_source();
    source.chars().take(FINGERPRINT_MAX_CHARS).collect()
}
