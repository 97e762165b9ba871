//! Shared replay store backed by Redis.
//!
//! Records are plain keys with a PX expiry, so Redis evicts them itself and
//! `sweep` has nothing to do. `check_and_mark` is a single `SET NX PX`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::{Expiration, SetOptions};

use crate::backend::{self, LuaScript};
use crate::clock::Clock;
use crate::replay::store::{ReplayError, ReplayStats, ReplayStore, MAX_RECORD_TTL};

static MARK_SCRIPT: LuaScript = LuaScript::new(
    r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('SET', KEYS[1], ARGV[1], 'KEEPTTL')
else
    redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
end
return 1
"#,
);

pub struct RedisReplayStore {
    client: Client,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl RedisReplayStore {
    pub fn new(client: Client, key_prefix: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            prefix: format!("{key_prefix}:sig"),
            clock,
        }
    }

    /// Value stored under a record key: when it was used, in Unix millis.
    fn stamp(&self) -> String {
        stamp(self.clock.as_ref())
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, token)
    }
}

fn unavailable(e: Error) -> ReplayError {
    ReplayError::Unavailable(e.to_string())
}

fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.min(MAX_RECORD_TTL).as_millis())
        .unwrap_or(i64::MAX)
        .max(1)
}

fn stamp(clock: &dyn Clock) -> String {
    clock.now_millis().to_string()
}

#[async_trait]
impl ReplayStore for RedisReplayStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn is_used(&self, token: &str) -> Result<bool, ReplayError> {
        self.client.exists(self.key(token)).await.map_err(unavailable)
    }

    async fn mark_used(&self, token: &str, ttl: Duration) -> Result<(), ReplayError> {
        let _: i64 = MARK_SCRIPT
            .exec(
                &self.client,
                vec![self.key(token)],
                vec![self.stamp(), ttl_ms(ttl).to_string()],
            )
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn check_and_mark(&self, token: &str, ttl: Duration) -> Result<bool, ReplayError> {
        let reply: Option<String> = self
            .client
            .set(
                self.key(token),
                self.stamp(),
                Some(Expiration::PX(ttl_ms(ttl))),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(unavailable)?;
        Ok(reply.is_some())
    }

    async fn sweep(&self) -> Result<usize, ReplayError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<usize, ReplayError> {
        backend::clear_matching(&self.client, &format!("{}:*", self.prefix))
            .await
            .map_err(unavailable)
    }

    async fn stats(&self) -> Result<ReplayStats, ReplayError> {
        let total = backend::count_matching(&self.client, &format!("{}:*", self.prefix))
            .await
            .map_err(unavailable)?;
        Ok(ReplayStats {
            total,
            records: Vec::new(),
        })
    }
}
