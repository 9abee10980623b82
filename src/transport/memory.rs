use std::sync::Mutex;

use super::{DeliveryCallback, DeliveryStatus, Transport};

/// One recorded delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub url: String,
    /// None for beacons.
    pub body: Option<String>,
    pub beacon: bool,
}

/// In-memory transport double: records every attempt and answers with a
/// scripted status, synchronously. Used by the integration tests and
/// available to embedders for theirs.
pub struct MemoryTransport {
    sent: Mutex<Vec<SentRequest>>,
    respond_with: Mutex<DeliveryStatus>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            respond_with: Mutex::new(DeliveryStatus::Accepted),
        }
    }

    /// A transport whose every attempt fails.
    pub fn failing() -> Self {
        let transport = Self::new();
        transport.respond_with(DeliveryStatus::Rejected);
        transport
    }

    pub fn respond_with(&self, status: DeliveryStatus) {
        *self.respond_with.lock().expect("transport poisoned") = status;
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().expect("transport poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("transport poisoned").len()
    }

    fn record(&self, request: SentRequest, on_done: DeliveryCallback) {
        let status = *self.respond_with.lock().expect("transport poisoned");
        self.sent.lock().expect("transport poisoned").push(request);
        on_done(status);
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn post_report(&self, url: &str, body: String, on_done: DeliveryCallback) {
        self.record(
            SentRequest {
                url: url.to_string(),
                body: Some(body),
                beacon: false,
            },
            on_done,
        );
    }

    fn beacon(&self, url: &str, on_done: DeliveryCallback) {
        self.record(
            SentRequest {
                url: url.to_string(),
                body: None,
                beacon: true,
            },
            on_done,
        );
    }
}
