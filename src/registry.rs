use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    basket::{Basket, MemoryBasket},
    error::BasketError,
    model::{BasketAuth, BasketConfig, BasketNamesPage, BasketNamesQueryPage},
    page,
};

/// Owns the name to basket mapping.
///
/// The registry lock only guards the name index; operations on a basket
/// obtained through [`BasketRegistry::get`] never contend on it.
#[async_trait]
pub trait BasketRegistry: Send + Sync {
    /// Registers a new empty basket and returns its freshly generated token.
    async fn create(&self, name: &str, config: BasketConfig) -> Result<BasketAuth, BasketError>;

    async fn get(&self, name: &str) -> Option<Arc<dyn Basket>>;

    /// No-op when the name is not registered.
    async fn delete(&self, name: &str);

    async fn size(&self) -> usize;

    async fn get_names(&self, max: usize, skip: usize) -> BasketNamesPage;

    async fn find_names(&self, query: &str, max: usize, skip: usize) -> BasketNamesQueryPage;

    /// Releases everything the registry holds. Called once at shutdown.
    async fn release(&self);
}

/// In-memory [`BasketRegistry`]; names are listed in lexicographic order.
#[derive(Default)]
pub struct MemoryRegistry {
    baskets: RwLock<BTreeMap<String, Arc<MemoryBasket>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[async_trait]
impl BasketRegistry for MemoryRegistry {
    async fn create(&self, name: &str, config: BasketConfig) -> Result<BasketAuth, BasketError> {
        config.validate()?;

        let mut baskets = self.baskets.write();
        if baskets.contains_key(name) {
            return Err(BasketError::DuplicateName(name.to_string()));
        }

        let token = generate_token();
        baskets.insert(
            name.to_string(),
            Arc::new(MemoryBasket::new(config, token.clone())),
        );
        info!(basket = name, "Created basket");

        Ok(BasketAuth { token })
    }

    async fn get(&self, name: &str) -> Option<Arc<dyn Basket>> {
        self.baskets
            .read()
            .get(name)
            .map(|basket| basket.clone() as Arc<dyn Basket>)
    }

    async fn delete(&self, name: &str) {
        if self.baskets.write().remove(name).is_some() {
            info!(basket = name, "Deleted basket");
        } else {
            debug!(basket = name, "Delete ignored, basket does not exist");
        }
    }

    async fn size(&self) -> usize {
        self.baskets.read().len()
    }

    async fn get_names(&self, max: usize, skip: usize) -> BasketNamesPage {
        let baskets = self.baskets.read();
        let names: Vec<String> = baskets.keys().skip(skip).take(max).cloned().collect();
        let count = names.len();

        BasketNamesPage {
            names,
            count,
            has_more: skip.saturating_add(count) < baskets.len(),
        }
    }

    async fn find_names(&self, query: &str, max: usize, skip: usize) -> BasketNamesQueryPage {
        let baskets = self.baskets.read();
        let matches = baskets.keys().filter(|name| name.contains(query)).cloned();
        let (names, has_more) = page::window(matches, max, skip);

        BasketNamesQueryPage { names, has_more }
    }

    async fn release(&self) {
        let mut baskets = self.baskets.write();
        info!(baskets = baskets.len(), "Releasing basket registry");
        baskets.clear();
    }
}
