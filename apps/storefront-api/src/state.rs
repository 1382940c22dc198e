//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aroma_core::recently_viewed::RecentlyViewed;
use aroma_db::Database;
use tokio::sync::Mutex;

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::rate_limit::RateLimiter;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    pub limiter: Arc<RateLimiter>,
    pub recently_viewed: RecentlyViewedState,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_secs);
        let limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );

        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            limiter: Arc::new(limiter),
            recently_viewed: RecentlyViewedState::default(),
        }
    }
}

/// Recently viewed products per customer, kept in memory.
#[derive(Debug, Clone, Default)]
pub struct RecentlyViewedState {
    inner: Arc<Mutex<HashMap<String, RecentlyViewed>>>,
}

impl RecentlyViewedState {
    /// Records a view and returns the customer's list, newest first.
    pub async fn record(&self, customer_id: &str, product_id: &str) -> Vec<String> {
        let mut map = self.inner.lock().await;
        let list = map.entry(customer_id.to_string()).or_default();
        list.record(product_id);
        list.ids()
    }

    /// The customer's list, newest first.
    pub async fn list(&self, customer_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .get(customer_id)
            .map(RecentlyViewed::ids)
            .unwrap_or_default()
    }

    /// Forgets a product, e.g. one that is no longer sold.
    pub async fn forget(&self, customer_id: &str, product_id: &str) {
        if let Some(list) = self.inner.lock().await.get_mut(customer_id) {
            list.remove(product_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recently_viewed_is_per_customer() {
        let state = RecentlyViewedState::default();

        state.record("ana", "p1").await;
        state.record("ana", "p2").await;
        let ids = state.record("ana", "p1").await;
        assert_eq!(ids, vec!["p1", "p2"]);

        assert!(state.list("bob").await.is_empty());

        state.forget("ana", "p2").await;
        assert_eq!(state.list("ana").await, vec!["p1"]);
    }
}
