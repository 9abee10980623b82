pub mod agent;
pub mod capture;
pub mod context;
pub mod engine;
pub mod host;
pub mod transport;
pub mod wrap;

// Re-export the surface a host application actually touches.
pub use agent::{Agent, AgentConfig, ErrorHook};
pub use capture::{spawn_watched, ConsoleLayer, NetworkWatch};
pub use engine::{CanonicalError, EntryKind, ErrorLike, ReportPayload};
pub use wrap::{Callback, CallbackTable};
