use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::CanonicalError;
use super::telemetry::{ConsoleEntry, NavigationEntry, NetworkEntry, VisitorEntry};
use crate::wrap::BindContext;

/// Total serialized console text allowed on one report. Guards against a
/// single pathological log line inflating every subsequent report.
pub const CONSOLE_BUDGET_BYTES: usize = 80_000;

/// Capture mechanism that produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A wrapped callable raised.
    Catch,
    /// The process panic hook fired.
    Panic,
    /// A watched async task unwound.
    Task,
    /// A captured network call failed.
    Network,
    /// An error-severity console line.
    Console,
    /// Manual `track` call.
    Direct,
}

/// Identity block stamped onto every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub token: String,
    pub application: String,
    pub session_id: Uuid,
    pub agent_version: String,
    pub started_ms: u64,
}

/// The unit of transmission. Immutable once assembled; the engine keeps no
/// history of past payloads beyond the gate's fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub report_id: Uuid,
    pub entry: EntryKind,
    pub error: CanonicalError,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<BindContext>,
    pub console: Vec<ConsoleEntry>,
    pub network: Vec<NetworkEntry>,
    pub navigation: Vec<NavigationEntry>,
    pub visitor: Vec<VisitorEntry>,
    /// Provider blocks, keyed by provider name.
    pub context: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, String>,
    /// Attempts the previous throttle window suppressed.
    pub throttled_since_last: u32,
    pub session: SessionInfo,
    pub timestamp_ms: u64,
}

/// Per-category snapshots taken from the log at capture time.
#[derive(Debug, Default)]
pub struct LogSnapshots {
    pub console: Vec<ConsoleEntry>,
    pub network: Vec<NetworkEntry>,
    pub navigation: Vec<NavigationEntry>,
    pub visitor: Vec<VisitorEntry>,
}

/// Pure merge of everything one failure event carries. Never blocks; the
/// caller owns the side effects (log clear, guard reset).
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    entry: EntryKind,
    error: CanonicalError,
    bind: Option<BindContext>,
    mut snapshots: LogSnapshots,
    context: BTreeMap<String, Value>,
    metadata: BTreeMap<String, String>,
    throttled_since_last: u32,
    session: SessionInfo,
    console_budget: usize,
    timestamp_ms: u64,
) -> ReportPayload {
    apply_console_budget(&mut snapshots.console, console_budget);
    ReportPayload {
        report_id: Uuid::new_v4(),
        entry,
        error,
        bind,
        console: snapshots.console,
        network: snapshots.network,
        navigation: snapshots.navigation,
        visitor: snapshots.visitor,
        context,
        metadata,
        throttled_since_last,
        session,
        timestamp_ms,
    }
}

/// Oldest entries keep their full text while budget remains; the entry
/// that crosses the budget is cut to the remainder, everything after it
/// is emptied.
fn apply_console_budget(entries: &mut [ConsoleEntry], budget: usize) {
    let mut remaining = budget;
    for entry in entries.iter_mut() {
        let len = entry.message.len();
        if len <= remaining {
            remaining -= len;
            continue;
        }
        entry.message = truncate_to_boundary(&entry.message, remaining);
        remaining = 0;
    }
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    let mut end = max_bytes.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
