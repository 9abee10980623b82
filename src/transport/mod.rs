pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::{MemoryTransport, SentRequest};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::error::CanonicalError;
use crate::engine::report::ReportPayload;

/// Binary outcome of one delivery attempt. Used only to decide channel
/// disablement; there is no retry contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Accepted,
    Rejected,
}

pub type DeliveryCallback = Box<dyn FnOnce(DeliveryStatus) + Send + 'static>;

/// Outbound delivery primitives. Implementations must not block the
/// caller and must always invoke the callback exactly once.
pub trait Transport: Send + Sync {
    /// Report channel primitive: POST one JSON document.
    fn post_report(&self, url: &str, body: String, on_done: DeliveryCallback);
    /// Fault channel primitive: fire a small GET beacon.
    fn beacon(&self, url: &str, on_done: DeliveryCallback);
}

/// One outbound delivery path. State machine: enabled → disabled, one-way;
/// there is no way back for the remainder of the process lifetime.
#[derive(Debug)]
pub struct Channel {
    name: &'static str,
    enabled: AtomicBool,
}

impl Channel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            warn!(target: "vigil::transport", channel = self.name, "channel disabled");
        }
    }
}

/// Endpoint selection. The forwarding override wins outright; otherwise
/// the configured capture/fault endpoints are used as-is.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub capture: String,
    pub fault: String,
    pub forward: Option<String>,
}

impl Endpoints {
    pub fn capture_url(&self, token: &str) -> String {
        let base = self.forward.as_deref().unwrap_or(&self.capture);
        with_params(base, &[("token", token)])
    }

    pub fn fault_url(&self, token: &str, error: &CanonicalError) -> String {
        let mut message = error.message.clone();
        if message.len() > 500 {
            let mut end = 500;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        with_params(
            &self.fault,
            &[
                ("token", token),
                ("name", error.name.as_str()),
                ("message", message.as_str()),
            ],
        )
    }
}

fn with_params(base: &str, params: &[(&str, &str)]) -> String {
    match reqwest::Url::parse_with_params(base, params.iter().copied()) {
        Ok(url) => url.to_string(),
        Err(err) => {
            debug!(target: "vigil::transport", %err, "endpoint did not parse, using base");
            base.to_string()
        }
    }
}

/// Best-effort, fire-and-forget delivery with self-disabling channels.
/// Never panics back to its caller; its own failures go out on the fault
/// channel, which uses a separate endpoint and a different primitive so a
/// fault report cannot trigger another fault.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    report_channel: Arc<Channel>,
    fault_channel: Arc<Channel>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            report_channel: Arc::new(Channel::new("report")),
            fault_channel: Arc::new(Channel::new("fault")),
        }
    }

    pub fn report_channel(&self) -> &Channel {
        &self.report_channel
    }

    pub fn fault_channel(&self) -> &Channel {
        &self.fault_channel
    }

    /// At-most-one-attempt delivery. A non-success status or transport
    /// failure disables the report channel; no retries, no queue.
    pub fn send(&self, endpoints: &Endpoints, payload: &ReportPayload, token: &str) {
        let attempt = catch_unwind(AssertUnwindSafe(|| {
            if !self.report_channel.is_enabled() {
                debug!(target: "vigil::transport", "report channel disabled, dropping payload");
                return;
            }
            let body = match serde_json::to_string(payload) {
                Ok(body) => body,
                Err(err) => {
                    // Serialization is the one primitive this channel
                    // cannot operate without.
                    self.report_channel.disable();
                    self.fault(
                        endpoints,
                        &CanonicalError::new("SerializationError", err.to_string()),
                        token,
                    );
                    return;
                }
            };
            let url = endpoints.capture_url(token);
            let channel = Arc::clone(&self.report_channel);
            self.transport.post_report(
                &url,
                body,
                Box::new(move |status| {
                    if status != DeliveryStatus::Accepted {
                        channel.disable();
                    }
                }),
            );
        }));
        if attempt.is_err() {
            self.fault(
                endpoints,
                &CanonicalError::new("TransmissionFault", "report send path panicked"),
                token,
            );
        }
    }

    /// Report a failure within the agent itself. Guarded the same way;
    /// if the fault path itself breaks, the channel goes dark silently.
    pub fn fault(&self, endpoints: &Endpoints, error: &CanonicalError, token: &str) {
        let attempt = catch_unwind(AssertUnwindSafe(|| {
            if !self.fault_channel.is_enabled() {
                return;
            }
            let url = endpoints.fault_url(token, error);
            let channel = Arc::clone(&self.fault_channel);
            self.transport.beacon(
                &url,
                Box::new(move |status| {
                    if status != DeliveryStatus::Accepted {
                        channel.disable();
                    }
                }),
            );
        }));
        if attempt.is_err() {
            self.fault_channel.disable();
        }
    }
}
