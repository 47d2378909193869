use std::time::Duration;

/// HTTP client with connection pooling and a bounded per-request timeout.
/// `insecure_tls` disables certificate validation.
pub fn build_client(insecure_tls: bool, timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(32)
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .danger_accept_invalid_certs(insecure_tls)
        .build()
}
