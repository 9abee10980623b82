use serde::{Deserialize, Serialize};

// Allowed: timestamps, severities, URLs, element labels, rendered text.
// Entries are immutable once appended, except network entries, which are
// completed in place by key lookup.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Console,
    Network,
    Navigation,
    Visitor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Telemetry {
    Console(ConsoleEntry),
    Network(NetworkEntry),
    Navigation(NavigationEntry),
    Visitor(VisitorEntry),
}

impl Telemetry {
    pub fn category(&self) -> Category {
        match self {
            Telemetry::Console(_) => Category::Console,
            Telemetry::Network(_) => Category::Network,
            Telemetry::Navigation(_) => Category::Navigation,
            Telemetry::Visitor(_) => Category::Visitor,
        }
    }

    pub fn into_console(self) -> Option<ConsoleEntry> {
        match self {
            Telemetry::Console(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn into_network(self) -> Option<NetworkEntry> {
        match self {
            Telemetry::Network(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn into_navigation(self) -> Option<NavigationEntry> {
        match self {
            Telemetry::Navigation(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn into_visitor(self) -> Option<VisitorEntry> {
        match self {
            Telemetry::Visitor(entry) => Some(entry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub severity: Severity,
    /// Module path or logger name that produced the line.
    pub target: String,
    pub message: String,
    pub timestamp_ms: u64,
}

/// Created at request start, completed at request end. If the entry is
/// evicted before completion the completion is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub started_ms: u64,
    pub duration_ms: Option<u64>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub from: String,
    pub to: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitorAction {
    Click,
    Input,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorEntry {
    pub action: VisitorAction,
    /// Short label for the control the visitor touched, never its value.
    pub element: String,
    pub timestamp_ms: u64,
}
