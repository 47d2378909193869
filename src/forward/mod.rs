use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST},
    Method, Url,
};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, error, warn};

use crate::{
    model::{parse_forward_url, BasketConfig, Headers, RequestRecord},
    telemetry,
};

mod client;
pub use client::build_client;

/// Best-effort relay of captured requests to a basket's upstream.
///
/// Forwarding is fire-and-forget: failures are logged and counted, never
/// retried, and never reported back to the capture path.
pub struct Forwarder {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(false, timeout)?,
            insecure_client: build_client(true, timeout)?,
            timeout,
        })
    }

    /// Spawns the forward on its own task so upstream latency never blocks
    /// the caller. Returns `None` when forwarding is disabled.
    pub fn dispatch(
        self: &Arc<Self>,
        record: Arc<RequestRecord>,
        config: BasketConfig,
        basket: &str,
    ) -> Option<JoinHandle<()>> {
        if config.forward_url.is_empty() {
            return None;
        }

        let forwarder = Arc::clone(self);
        let basket = basket.to_string();
        Some(tokio::spawn(async move {
            forwarder.forward(&record, &config, &basket).await;
        }))
    }

    /// Client matching the basket's TLS policy.
    pub fn client_for(&self, config: &BasketConfig) -> &reqwest::Client {
        if config.insecure_tls {
            &self.insecure_client
        } else {
            &self.client
        }
    }

    pub async fn forward(&self, record: &RequestRecord, config: &BasketConfig, basket: &str) {
        if config.forward_url.is_empty() {
            return;
        }

        let Some(url) = forward_url(record, config, basket) else {
            warn!(
                basket = basket,
                forward_url = %config.forward_url,
                "Invalid forward URL"
            );
            telemetry::record_forward(basket, false);
            return;
        };

        let method = match Method::from_bytes(record.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                error!(basket = basket, method = %record.method, "Failed to create forward request");
                telemetry::record_forward(basket, false);
                return;
            }
        };

        let client = self.client_for(config);

        debug!(basket = basket, url = %url, method = %method, "Forwarding request");

        let request = client
            .request(method, url.clone())
            .headers(forward_headers(&record.headers))
            .body(record.body.clone());

        let outcome = timeout(self.timeout, async {
            let response = request.send().await?;
            let status = response.status();
            // Drain so the pooled connection can be reused.
            response.bytes().await?;
            Ok::<_, reqwest::Error>(status)
        })
        .await;

        let success = match outcome {
            Ok(Ok(status)) if status.is_success() => {
                debug!(basket = basket, url = %url, status = status.as_u16(), "Request forwarded");
                true
            }
            Ok(Ok(status)) => {
                warn!(
                    basket = basket,
                    url = %url,
                    status = status.as_u16(),
                    "Forward target returned non-success status"
                );
                false
            }
            Ok(Err(e)) => {
                error!(basket = basket, url = %url, "Failed to forward request: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    basket = basket,
                    url = %url,
                    "Forward request timed out after {:?}",
                    self.timeout
                );
                false
            }
        };
        telemetry::record_forward(basket, success);
    }
}

/// Builds the upstream URL for a captured request.
///
/// With `expand_path`, the captured path minus its `/{basket}` prefix is
/// appended to the forward URL path. The captured query is appended to any
/// query already present on the forward URL.
pub fn forward_url(record: &RequestRecord, config: &BasketConfig, basket: &str) -> Option<Url> {
    let mut url = parse_forward_url(&config.forward_url)?;

    if config.expand_path && record.path.len() > basket.len() + 1 {
        let prefix = format!("/{}", basket);
        let expanded = {
            let base = url.path();
            let base = base.strip_suffix('/').unwrap_or(base);
            let suffix = record.path.strip_prefix(&prefix).unwrap_or(&record.path);
            format!("{}{}", base, suffix)
        };
        url.set_path(&expanded);
    }

    if !record.query.is_empty() {
        let query = match url.query().filter(|q| !q.is_empty()) {
            Some(existing) => format!("{}&{}", existing, record.query),
            None => record.query.clone(),
        };
        url.set_query(Some(&query));
    }

    Some(url)
}

/// Copies every captured header value. `Host` and `Content-Length` are
/// left for the client to derive from the upstream URL and body.
fn forward_headers(headers: &Headers) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, values) in headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!(header = %name, "Skipping invalid header name");
            continue;
        };
        if name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                forwarded.append(name.clone(), value);
            }
        }
    }
    forwarded
}
