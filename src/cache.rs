use rand::Rng;
use redis::AsyncCommands;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// JSON cache over Redis when `REDIS_URL` is set, an in-process TTL map
/// otherwise. Writers never coordinate: concurrent requests for one key
/// race and the last write wins.
#[derive(Clone)]
pub struct CacheStore {
    redis: Option<redis::Client>,
    memory: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

struct MemoryEntry {
    expires_at: Instant,
    payload: String,
}

impl CacheStore {
    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL")
            .ok()
            .and_then(|url| redis::Client::open(url).ok());
        Self::new(redis)
    }

    pub fn new(redis: Option<redis::Client>) -> Self {
        Self {
            redis,
            memory: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(client) = &self.redis {
            let mut conn = client.get_multiplexed_async_connection().await.ok()?;
            let payload: Option<String> = conn.get(key).await.ok();
            return payload.and_then(|value| serde_json::from_str(&value).ok());
        }

        let mut guard = self.memory.lock().await;
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                serde_json::from_str(&entry.payload).ok()
            }
            Some(_) => {
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    /// Cache failures are swallowed; a cold cache is never an error.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        let ttl = jittered(ttl);

        if let Some(client) = &self.redis {
            if let Ok(mut conn) = client.get_multiplexed_async_connection().await {
                let _: Result<(), _> = conn.set_ex(key, payload, ttl.as_secs()).await;
            }
            return;
        }

        let mut guard = self.memory.lock().await;
        let now = Instant::now();
        guard.retain(|_, entry| entry.expires_at > now);
        guard.insert(
            key.to_string(),
            MemoryEntry {
                expires_at: now + ttl,
                payload,
            },
        );
    }
}

/// Up to 10% extra TTL so keys written together do not expire together.
fn jittered(ttl: Duration) -> Duration {
    let base = ttl.as_secs().max(1);
    let jitter = rand::rng().random_range(0..=base / 10);
    Duration::from_secs(base + jitter)
}

pub fn feed_cache_key(feed: &str, limit: u32) -> String {
    format!("feed:{feed}:{limit}")
}

pub fn idempotency_cache_key(key: &str) -> String {
    format!("import:idem:{key}")
}

pub fn feed_cache_ttl() -> Duration {
    let secs = std::env::var("FEED_CACHE_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(300);
    Duration::from_secs(secs)
}

pub fn idempotency_ttl() -> Duration {
    let secs = std::env::var("IDEMPOTENCY_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(3600);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_roundtrip() {
        let cache = CacheStore::new(None);
        cache
            .set("feed:choice:10", &vec!["a".to_string()], Duration::from_secs(60))
            .await;
        let hit: Option<Vec<String>> = cache.get("feed:choice:10").await;
        assert_eq!(hit, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = CacheStore::new(None);
        let miss: Option<Vec<String>> = cache.get("feed:mixed:5").await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let cache = CacheStore::new(None);
        cache.set("k", &1u32, Duration::from_secs(60)).await;
        cache.set("k", &2u32, Duration::from_secs(60)).await;
        let value: Option<u32> = cache.get("k").await;
        assert_eq!(value, Some(2));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        for _ in 0..32 {
            let ttl = jittered(Duration::from_secs(100));
            assert!(ttl.as_secs() >= 100 && ttl.as_secs() <= 110);
        }
    }
}
