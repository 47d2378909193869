use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::BasketError,
    matcher::SearchScope,
    model::{BasketConfig, RequestRecord, RequestsPage, RequestsQueryPage, ResponseConfig},
    page, telemetry,
};

/// Response-table key holding the default response.
pub const DEFAULT_RESPONSE_KEY: &str = "*";

/// A named capture endpoint: a bounded request log, a response table, its
/// configuration and its access token.
///
/// Implementations must keep `size() <= config().capacity` at all times and
/// must never expose a log in the middle of an eviction.
#[async_trait]
pub trait Basket: Send + Sync {
    async fn config(&self) -> BasketConfig;

    /// Replaces the configuration, evicting the oldest records if the new
    /// capacity is below the current size.
    async fn update(&self, config: BasketConfig) -> Result<(), BasketError>;

    async fn authorize(&self, token: &str) -> bool;

    /// Response for `method`, falling back to the default entry, then to a
    /// zero-value response.
    async fn get_response(&self, method: &str) -> ResponseConfig;

    /// An empty method or [`DEFAULT_RESPONSE_KEY`] sets the default response.
    async fn set_response(&self, method: &str, response: ResponseConfig);

    /// Appends a record, evicting the oldest ones beyond capacity.
    async fn add(&self, record: RequestRecord) -> Arc<RequestRecord> {
        self.capture(record).await.0
    }

    /// Same as [`Basket::add`], also returning the configuration in force
    /// when the record was stored. Both happen under one lock, so a
    /// concurrent `update` cannot slip in between.
    async fn capture(&self, record: RequestRecord) -> (Arc<RequestRecord>, BasketConfig);

    async fn clear(&self);

    async fn size(&self) -> usize;

    /// Oldest-first window over the log.
    async fn get_requests(&self, max: usize, skip: usize) -> RequestsPage;

    /// Oldest-first window over the records matching `query` within `scope`.
    async fn find_requests(
        &self,
        query: &str,
        scope: SearchScope,
        max: usize,
        skip: usize,
    ) -> RequestsQueryPage;
}

struct BasketState {
    config: BasketConfig,
    records: VecDeque<Arc<RequestRecord>>,
    responses: HashMap<String, ResponseConfig>,
}

impl BasketState {
    fn evict_excess(&mut self) -> usize {
        let excess = self.records.len().saturating_sub(self.config.capacity);
        self.records.drain(..excess);
        excess
    }
}

/// In-memory [`Basket`]. Every basket owns its own lock.
pub struct MemoryBasket {
    token: String,
    state: RwLock<BasketState>,
}

impl MemoryBasket {
    pub fn new(config: BasketConfig, token: String) -> Self {
        let capacity = config.capacity;
        Self {
            token,
            state: RwLock::new(BasketState {
                config,
                records: VecDeque::with_capacity(capacity.min(1024)),
                responses: HashMap::new(),
            }),
        }
    }
}

fn response_key(method: &str) -> &str {
    if method.is_empty() {
        DEFAULT_RESPONSE_KEY
    } else {
        method
    }
}

#[async_trait]
impl Basket for MemoryBasket {
    async fn config(&self) -> BasketConfig {
        self.state.read().config.clone()
    }

    async fn update(&self, config: BasketConfig) -> Result<(), BasketError> {
        config.validate()?;

        let mut state = self.state.write();
        state.config = config;
        let evicted = state.evict_excess();
        if evicted > 0 {
            debug!(
                evicted = evicted,
                capacity = state.config.capacity,
                "Shrinking basket log"
            );
        }
        telemetry::record_evicted(evicted);
        Ok(())
    }

    async fn authorize(&self, token: &str) -> bool {
        !self.token.is_empty() && self.token == token
    }

    async fn get_response(&self, method: &str) -> ResponseConfig {
        let state = self.state.read();
        state
            .responses
            .get(method)
            .or_else(|| state.responses.get(DEFAULT_RESPONSE_KEY))
            .cloned()
            .unwrap_or_default()
    }

    async fn set_response(&self, method: &str, response: ResponseConfig) {
        self.state
            .write()
            .responses
            .insert(response_key(method).to_string(), response);
    }

    async fn capture(&self, record: RequestRecord) -> (Arc<RequestRecord>, BasketConfig) {
        let record = Arc::new(record);

        let mut state = self.state.write();
        state.records.push_back(record.clone());
        telemetry::record_evicted(state.evict_excess());

        (record, state.config.clone())
    }

    async fn clear(&self) {
        self.state.write().records.clear();
    }

    async fn size(&self) -> usize {
        self.state.read().records.len()
    }

    async fn get_requests(&self, max: usize, skip: usize) -> RequestsPage {
        let state = self.state.read();
        let total_count = state.records.len();
        let requests: Vec<RequestRecord> = state
            .records
            .iter()
            .skip(skip)
            .take(max)
            .map(|record| record.as_ref().clone())
            .collect();
        let count = requests.len();

        RequestsPage {
            requests,
            count,
            total_count,
            has_more: skip.saturating_add(count) < total_count,
        }
    }

    async fn find_requests(
        &self,
        query: &str,
        scope: SearchScope,
        max: usize,
        skip: usize,
    ) -> RequestsQueryPage {
        let state = self.state.read();
        let matches = state
            .records
            .iter()
            .filter(|record| record.matches(query, scope));
        let (found, has_more) = page::window(matches, max, skip);

        RequestsQueryPage {
            requests: found.into_iter().map(|record| record.as_ref().clone()).collect(),
            has_more,
        }
    }
}
