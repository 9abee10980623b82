//! Peripheral watchers: the adapters that feed the engine.
//!
//! Each ambient surface gets a capability-checked adapter; when a surface
//! is absent or already instrumented by another agent, the adapter skips
//! and the engine degrades gracefully. Watchers write the telemetry log
//! continuously during normal operation, independent of error reporting.

pub mod console;
pub mod network;
pub mod panic_hook;
pub mod task;

pub use console::ConsoleLayer;
pub use network::NetworkWatch;
pub use panic_hook::{PanicHookSurface, PatchSurface};
pub use task::spawn_watched;
