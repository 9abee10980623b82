//! Aggregation engine core.
//!
//! # SAFETY INVARIANT
//! Nothing in this module may panic its caller. Capture bookkeeping that
//! fails is dropped or redirected to the fault channel; the host
//! application must be unable to crash because of its own instrumentation.
//!
//! # BOUNDEDNESS INVARIANT
//! The telemetry log is a scratchpad, never a store: capacity-limited,
//! oldest-first eviction, cleared after every assembled report.

pub mod error;
pub mod gate;
pub mod log;
pub mod report;
pub mod telemetry;

pub use error::{normalize, CanonicalError, ErrorLike};
pub use gate::{Admission, Gate};
pub use log::{EntryKey, TelemetryLog};
pub use report::{EntryKind, ReportPayload, SessionInfo};
pub use telemetry::{
    Category, ConsoleEntry, NavigationEntry, NetworkEntry, Severity, Telemetry, VisitorAction,
    VisitorEntry,
};
