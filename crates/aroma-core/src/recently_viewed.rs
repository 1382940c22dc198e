//! Bounded, most-recent-first list of viewed product ids.
//!
//! Viewing a product again moves it to the front instead of duplicating it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use ts_rs::TS;

use crate::MAX_RECENTLY_VIEWED;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyViewed {
    #[ts(as = "Vec<String>")]
    product_ids: VecDeque<String>,
    capacity: usize,
}

impl Default for RecentlyViewed {
    fn default() -> Self {
        RecentlyViewed::with_capacity(MAX_RECENTLY_VIEWED)
    }
}

impl RecentlyViewed {
    pub fn with_capacity(capacity: usize) -> Self {
        RecentlyViewed {
            product_ids: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records a view. Returns the id evicted to stay within capacity.
    pub fn record(&mut self, product_id: &str) -> Option<String> {
        if let Some(pos) = self.product_ids.iter().position(|id| id == product_id) {
            self.product_ids.remove(pos);
        }
        self.product_ids.push_front(product_id.to_string());

        if self.product_ids.len() > self.capacity {
            self.product_ids.pop_back()
        } else {
            None
        }
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| id != product_id);
        self.product_ids.len() != before
    }

    /// Most recent first.
    pub fn ids(&self) -> Vec<String> {
        self.product_ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first_without_duplicates() {
        let mut rv = RecentlyViewed::default();
        rv.record("a");
        rv.record("b");
        rv.record("a");

        assert_eq!(rv.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut rv = RecentlyViewed::with_capacity(2);
        assert_eq!(rv.record("a"), None);
        assert_eq!(rv.record("b"), None);
        assert_eq!(rv.record("c"), Some("a".to_string()));
        assert_eq!(rv.len(), 2);

        assert!(rv.remove("b"));
        assert!(!rv.remove("zzz"));
        assert_eq!(rv.ids(), vec!["c".to_string()]);
    }
}
