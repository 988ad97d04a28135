//! Per-process response cache.
//!
//! Entries expire lazily on read and in bulk through [`EdgeCache::clear_expired`],
//! which the server calls from a background sweeper. Writes that touch a budget call
//! [`EdgeCache::invalidate_budget_cache`] so readers never see stale aggregates.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key families derived from a budget id.
pub const BUDGET_PREFIXES: [&str; 7] = [
    "dashboard",
    "budget-overview",
    "envelopes-summary",
    "transactions",
    "reports",
    "envelopes",
    "categories",
];

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

pub struct EdgeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl EdgeCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let entry = CacheEntry { value, expires_at: Instant::now() + ttl };
        self.lock().insert(key.into(), entry);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns how many were dropped.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drop every key family derived from `budget_id`. Matching stops at segment
    /// boundaries, so `b1` leaves `b10` alone.
    pub fn invalidate_budget_cache(&self, budget_id: &str) -> usize {
        let removed: usize = BUDGET_PREFIXES
            .iter()
            .map(|family| {
                let key = format!("{}:{}", family, budget_id);
                usize::from(self.delete(&key)) + self.delete_prefix(&format!("{}:", key))
            })
            .sum();
        tracing::debug!("Invalidated {} cache entries for budget {}", removed, budget_id);
        removed
    }

    /// Entry count, including entries that expired but have not been swept yet.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Key builders, so readers and invalidation agree on the format.
pub struct CacheKeys;

impl CacheKeys {
    pub fn dashboard(budget_id: &str) -> String {
        format!("dashboard:{}", budget_id)
    }

    pub fn budget_overview(budget_id: &str) -> String {
        format!("budget-overview:{}", budget_id)
    }

    pub fn envelopes_summary(budget_id: &str) -> String {
        format!("envelopes-summary:{}", budget_id)
    }

    pub fn transactions(budget_id: &str, query: &str) -> String {
        format!("transactions:{}:{}", budget_id, query)
    }

    pub fn reports(budget_id: &str, report: &str) -> String {
        format!("reports:{}:{}", budget_id, report)
    }

    pub fn envelopes(budget_id: &str) -> String {
        format!("envelopes:{}", budget_id)
    }

    pub fn categories(budget_id: &str) -> String {
        format!("categories:{}", budget_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_returns_fresh_value() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        cache.set("dashboard:b1", json!({"total": 1}));
        assert_eq!(cache.get("dashboard:b1"), Some(json!({"total": 1})));
        assert_eq!(cache.get("dashboard:b2"), None);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        cache.set_with_ttl("k", json!(1), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn clear_expired_keeps_live_entries() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        cache.set_with_ttl("short", json!(1), Duration::from_millis(10));
        cache.set("long", json!(2));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.clear_expired(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
    }

    #[test]
    fn budget_invalidation_leaves_other_budgets() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        let owned = [
            CacheKeys::dashboard("b1"),
            CacheKeys::budget_overview("b1"),
            CacheKeys::envelopes_summary("b1"),
            CacheKeys::transactions("b1", "limit=50"),
            CacheKeys::reports("b1", "monthly"),
            CacheKeys::envelopes("b1"),
            CacheKeys::categories("b1"),
        ];
        for key in &owned {
            cache.set(key.clone(), json!(1));
        }
        cache.set(CacheKeys::dashboard("b2"), json!(2));
        cache.set(CacheKeys::dashboard("b10"), json!(3));
        cache.set(CacheKeys::transactions("b10", "limit=50"), json!(4));
        cache.set("user:b1", json!(5));

        assert_eq!(cache.invalidate_budget_cache("b1"), owned.len());
        assert_eq!(
            cache.keys(),
            vec![
                "dashboard:b10".to_string(),
                "dashboard:b2".to_string(),
                "transactions:b10:limit=50".to_string(),
                "user:b1".to_string(),
            ]
        );
    }

    #[test]
    fn delete_prefix_counts_removed_keys() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        cache.set("reports:b1:monthly", json!(1));
        cache.set("reports:b1:yearly", json!(2));
        cache.set("reports:b2:monthly", json!(3));

        assert_eq!(cache.delete_prefix("reports:b1:"), 2);
        assert_eq!(cache.delete_prefix("reports:b1:"), 0);
        assert_eq!(cache.keys(), vec!["reports:b2:monthly".to_string()]);
    }

    #[test]
    fn entry_lives_until_its_ttl_has_passed() {
        let entry = CacheEntry { value: json!(1), expires_at: Instant::now() + Duration::from_secs(60) };
        assert!(!entry.is_expired(entry.expires_at));
        assert!(entry.is_expired(entry.expires_at + Duration::from_millis(1)));
    }

    #[test]
    fn delete_and_clear() {
        let cache = EdgeCache::new(Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert_eq!(cache.size(), 0);
    }
}
