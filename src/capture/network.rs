use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::agent::AgentInner;
use crate::engine::error::ErrorLike;
use crate::engine::log::EntryKey;
use crate::engine::report::EntryKind;
use crate::engine::telemetry::{Category, NetworkEntry, Telemetry};

/// Instrumentation handle for outbound calls: one entry is started per
/// request and completed in place when the response lands. Cheap to
/// clone, safe to park inside client middleware.
#[derive(Clone)]
pub struct NetworkWatch {
    inner: Arc<AgentInner>,
}

impl NetworkWatch {
    pub(crate) fn new(inner: Arc<AgentInner>) -> Self {
        Self { inner }
    }

    /// Record the start of a request. Returns None when network capture
    /// is disabled.
    pub fn begin(&self, method: &str, url: &str) -> Option<EntryKey> {
        let config = match self.inner.config.read() {
            Ok(guard) => guard.network.clone(),
            Err(_) => return None,
        };
        if !config.enabled {
            return None;
        }
        let now = self.inner.host.now_ms();
        self.inner.append(Telemetry::Network(NetworkEntry {
            method: method.to_uppercase(),
            url: url.to_string(),
            status: None,
            started_ms: now,
            duration_ms: None,
            completed: false,
        }))
    }

    /// Complete a previously started entry. If it was evicted in the
    /// meantime the completion is dropped; expected under load. Failure
    /// statuses feed the report path with kind `network` when configured.
    pub fn complete(&self, key: EntryKey, status: u16) {
        let now = self.inner.host.now_ms();
        let mut failed_call = None;
        {
            let Ok(mut log) = self.inner.log.lock() else {
                return;
            };
            match log.get_mut(Category::Network, key) {
                Some(Telemetry::Network(entry)) => {
                    entry.status = Some(status);
                    entry.duration_ms = Some(now.saturating_sub(entry.started_ms));
                    entry.completed = true;
                    if status >= 400 {
                        failed_call = Some(format!("{} {} {}", status, entry.method, entry.url));
                    }
                }
                _ => {
                    debug!(target: "vigil::network", "completion for evicted entry dropped");
                    return;
                }
            }
        }

        if let Some(description) = failed_call {
            let report_failures = self
                .inner
                .config
                .read()
                .map(|c| c.network.report_failures)
                .unwrap_or(false);
            if report_failures {
                AgentInner::report(
                    &self.inner,
                    ErrorLike::Value(Value::String(description)),
                    EntryKind::Network,
                    None,
                    false,
                );
            }
        }
    }
}
