use std::backtrace::Backtrace;
use std::time::{SystemTime, UNIX_EPOCH};

use super::Host;

/// Production host: system clock, std backtraces, tokio deferral.
#[derive(Debug, Default)]
pub struct TokioHost;

impl TokioHost {
    pub fn new() -> Self {
        Self
    }
}

impl Host for TokioHost {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn capture_stack(&self) -> String {
        Backtrace::force_capture().to_string()
    }

    fn defer(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { job() });
            }
            // No runtime to reschedule on. Running inline loses the
            // after-this-turn ordering but never loses the job.
            Err(_) => job(),
        }
    }
}
