pub mod manual;
pub mod tokio_host;

pub use manual::ManualHost;
pub use tokio_host::TokioHost;

/// Ambient services the engine needs from its surroundings.
///
/// Everything time- or scheduling-shaped goes through this trait so a test
/// double can substitute the host environment entirely. Nothing here may
/// block.
pub trait Host: Send + Sync {
    /// Wall-clock milliseconds. Drives the throttle window and entry
    /// timestamps; monotonicity is not assumed beyond "good enough".
    fn now_ms(&self) -> u64;

    /// Capture a synthetic stack trace at the current call site.
    fn capture_stack(&self) -> String;

    /// Zero-delay deferral: run `job` after the current callback turn
    /// completes. An ordering guarantee, not a timing one.
    fn defer(&self, job: Box<dyn FnOnce() + Send + 'static>);
}
