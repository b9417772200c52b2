use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use actix_web::web::Bytes;

/// Rendered page bodies kept for a fixed time. Stale entries are dropped
/// when they are looked up and swept on every insert.
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Bytes)>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> PageCache {
        PageCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.ttl > Duration::from_secs(0)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        if !self.enabled() {
            return None;
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = match entries.get(key) {
            Some(&(stored, ref body)) if stored.elapsed() < self.ttl => Some(body.clone()),
            Some(_) => None,
            None => return None,
        };

        if fresh.is_none() {
            entries.remove(key);
        }
        fresh
    }

    pub fn insert(&self, key: String, body: Bytes) {
        if !self.enabled() {
            return;
        }

        let ttl = self.ttl;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, &mut (stored, _)| stored.elapsed() < ttl);
        entries.insert(key, (Instant::now(), body));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn serves_until_expiry() {
        let cache = PageCache::new(Duration::from_millis(50));
        cache.insert("1".to_string(), Bytes::from_static(b"page one"));
        assert_eq!(cache.get("1"), Some(Bytes::from_static(b"page one")));
        assert_eq!(cache.get("2"), None);

        sleep(Duration::from_millis(80));
        assert_eq!(cache.get("1"), None);
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let cache = PageCache::new(Duration::from_millis(10));
        for n in 0..5000 {
            cache.insert(n.to_string(), Bytes::from_static(b"page"));
        }
        assert_eq!(cache.len(), 5000);

        sleep(Duration::from_millis(30));
        cache.insert("fresh".to_string(), Bytes::from_static(b"page"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn zero_ttl_disables() {
        let cache = PageCache::new(Duration::from_secs(0));
        cache.insert("1".to_string(), Bytes::from_static(b"page one"));
        assert_eq!(cache.get("1"), None);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert("1".to_string(), Bytes::from_static(b"page one"));
        cache.clear();
        assert_eq!(cache.get("1"), None);
    }
}
