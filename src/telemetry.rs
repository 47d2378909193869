use metrics::counter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NAMESPACE: &str = "baskets";

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

pub fn record_captured(basket: &str) {
    let name = format!("{}_requests_captured", NAMESPACE);
    counter!(name, "basket" => basket.to_string()).increment(1);
}

pub fn record_evicted(count: usize) {
    if count == 0 {
        return;
    }
    let name = format!("{}_requests_evicted", NAMESPACE);
    counter!(name).increment(count as u64);
}

pub fn record_forward(basket: &str, success: bool) {
    let name = if success {
        format!("{}_forward_success", NAMESPACE)
    } else {
        format!("{}_forward_failure", NAMESPACE)
    };
    counter!(name, "basket" => basket.to_string()).increment(1);
}
