use tracing::{debug, warn};
use uuid::Uuid;

use crate::redis_client::RedisClient;

/// Short-lived cache of rendered seat maps, keyed `seats:{event_id}`.
///
/// Without a redis connection every call is a no-op; redis errors are
/// logged and otherwise ignored.
#[derive(Clone)]
pub struct SeatMapCache {
    redis: Option<RedisClient>,
    ttl_seconds: u64,
}

fn seats_key(event_id: Uuid) -> String {
    format!("seats:{}", event_id)
}

impl SeatMapCache {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self {
            redis: Some(redis),
            ttl_seconds,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_seconds: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    pub async fn get(&self, event_id: Uuid) -> Option<String> {
        let redis = self.redis.as_ref()?;
        match redis.get(&seats_key(event_id)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Seat map cache read failed for event {}: {}", event_id, e);
                None
            }
        }
    }

    pub async fn put(&self, event_id: Uuid, seat_map: &str) {
        let Some(redis) = &self.redis else { return };
        if let Err(e) = redis
            .set_ex(&seats_key(event_id), seat_map, self.ttl_seconds)
            .await
        {
            warn!("Seat map cache write failed for event {}: {}", event_id, e);
        }
    }

    // Called after every seat mutation
    pub async fn invalidate(&self, event_id: Uuid) {
        let Some(redis) = &self.redis else { return };
        match redis.del(&seats_key(event_id)).await {
            Ok(()) => debug!("Invalidated seats cache for event {}", event_id),
            Err(e) => warn!("Seat map cache invalidation failed for event {}: {}", event_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = SeatMapCache::disabled();
        let event = Uuid::new_v4();
        cache.put(event, "{}").await;
        assert!(cache.get(event).await.is_none());
        cache.invalidate(event).await;
        assert!(!cache.is_enabled());
    }

    #[test]
    fn key_format() {
        let id = Uuid::nil();
        assert_eq!(seats_key(id), "seats:00000000-0000-0000-0000-000000000000");
    }
}
