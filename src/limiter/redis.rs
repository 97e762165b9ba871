//! Shared counter store backed by Redis.
//!
//! Atomicity comes from running check-and-increment as a single Lua script,
//! so every gatekeeper instance pointed at the same Redis shares one bucket
//! per key. Expiry is native (PEXPIRE), so `sweep` is a no-op.

use async_trait::async_trait;
use fred::prelude::*;

use crate::backend::{self, LuaScript};
use crate::limiter::store::{BucketSnapshot, ConsumeOutcome, ConsumeRequest, CounterStore, StoreError};

static CONSUME_SCRIPT: LuaScript = LuaScript::new(include_str!("consume.lua"));

pub struct RedisCounterStore {
    client: Client,
    prefix: String,
}

impl RedisCounterStore {
    pub fn new(client: Client, key_prefix: &str) -> Self {
        Self {
            client,
            prefix: format!("{key_prefix}:rl"),
        }
    }

    fn bucket_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn block_key(&self, key: &str) -> String {
        format!("{}:block:{}", self.prefix, key)
    }
}

fn unavailable(e: Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn parse_reply(reply: &[i64]) -> Result<ConsumeOutcome, StoreError> {
    let [consumed, allowed, ms, blocked] = reply else {
        return Err(StoreError::Protocol(format!(
            "expected 4 values from consume script, got {}",
            reply.len()
        )));
    };
    Ok(ConsumeOutcome {
        allowed: *allowed == 1,
        consumed: u32::try_from(*consumed).unwrap_or(u32::MAX),
        ms_before_next: u64::try_from(*ms).unwrap_or(0),
        blocked: *blocked == 1,
    })
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn try_consume(
        &self,
        key: &str,
        req: ConsumeRequest,
    ) -> Result<ConsumeOutcome, StoreError> {
        let reply: Vec<i64> = CONSUME_SCRIPT
            .exec(
                &self.client,
                vec![self.bucket_key(key), self.block_key(key)],
                vec![
                    req.points.to_string(),
                    req.window_ms.to_string(),
                    req.block_ms.to_string(),
                ],
            )
            .await
            .map_err(unavailable)?;
        parse_reply(&reply)
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .del::<(), _>(vec![self.bucket_key(key), self.block_key(key)])
            .await
            .map_err(unavailable)
    }

    async fn peek(&self, key: &str, _now_ms: u64) -> Result<Option<BucketSnapshot>, StoreError> {
        let consumed: Option<u32> = self.client.get(self.bucket_key(key)).await.map_err(unavailable)?;
        let bucket_ttl: i64 = self.client.pttl(self.bucket_key(key)).await.map_err(unavailable)?;
        let block_ttl: i64 = self.client.pttl(self.block_key(key)).await.map_err(unavailable)?;

        let Some(consumed) = consumed else {
            return Ok(None);
        };
        Ok(Some(BucketSnapshot {
            consumed,
            ms_before_reset: u64::try_from(bucket_ttl.max(block_ttl)).unwrap_or(0),
            blocked: block_ttl > 0,
        }))
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        backend::clear_matching(&self.client, &format!("{}:*", self.prefix))
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let outcome = parse_reply(&[2, 0, 30_000, 1]).unwrap();
        assert!(!outcome.allowed);
        assert!(outcome.blocked);
        assert_eq!(outcome.consumed, 2);
        assert_eq!(outcome.ms_before_next, 30_000);

        assert!(matches!(parse_reply(&[1, 1]), Err(StoreError::Protocol(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_consume_and_reset() {
        let client = backend::connect(
            &crate::config::schema::RedisConfig::default(),
            std::time::Duration::from_secs(2),
        )
        .await
        .expect("Failed to connect to Redis");
        let store = RedisCounterStore::new(client, &format!("test-{}", uuid::Uuid::new_v4()));
        let req = ConsumeRequest {
            points: 1,
            window_ms: 60_000,
            block_ms: 0,
            now_ms: 0,
        };

        assert!(store.try_consume("ip:1.1.1.1", req).await.unwrap().allowed);
        assert!(!store.try_consume("ip:1.1.1.1", req).await.unwrap().allowed);

        store.reset("ip:1.1.1.1").await.unwrap();
        assert!(store.try_consume("ip:1.1.1.1", req).await.unwrap().allowed);
        assert_eq!(store.clear().await.unwrap(), 1);
    }
}
