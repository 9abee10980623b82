use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::{DeliveryCallback, DeliveryStatus, Transport};

/// Production transport over reqwest. Sends are spawned onto the ambient
/// tokio runtime; the engine imposes no timeout of its own beyond the
/// client-level one configured here.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }

    fn spawn(job: impl std::future::Future<Output = DeliveryStatus> + Send + 'static, on_done: DeliveryCallback) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    on_done(job.await);
                });
            }
            Err(_) => {
                // No runtime means no delivery path at all.
                debug!(target: "vigil::transport", "no runtime available for send");
                on_done(DeliveryStatus::Rejected);
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post_report(&self, url: &str, body: String, on_done: DeliveryCallback) {
        let client = self.client.clone();
        let url = url.to_string();
        Self::spawn(
            async move {
                match client
                    .post(url.as_str())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => DeliveryStatus::Accepted,
                    Ok(resp) => {
                        debug!(target: "vigil::transport", status = %resp.status(), "report rejected");
                        DeliveryStatus::Rejected
                    }
                    Err(err) => {
                        debug!(target: "vigil::transport", %err, "report send failed");
                        DeliveryStatus::Rejected
                    }
                }
            },
            on_done,
        );
    }

    fn beacon(&self, url: &str, on_done: DeliveryCallback) {
        let client = self.client.clone();
        let url = url.to_string();
        Self::spawn(
            async move {
                match client.get(url.as_str()).send().await {
                    Ok(resp) if resp.status().is_success() => DeliveryStatus::Accepted,
                    Ok(resp) => {
                        debug!(target: "vigil::transport", status = %resp.status(), "beacon rejected");
                        DeliveryStatus::Rejected
                    }
                    Err(err) => {
                        debug!(target: "vigil::transport", %err, "beacon failed");
                        DeliveryStatus::Rejected
                    }
                }
            },
            on_done,
        );
    }
}
