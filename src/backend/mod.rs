//! Shared Redis plumbing for the counter and replay stores.
//!
//! # Responsibilities
//! - Connect a `fred` client with a bounded wait
//! - Run Lua scripts by SHA, reloading once on NOSCRIPT

use std::time::Duration;

use fred::prelude::*;
use fred::types::FromValue;
use tokio::sync::RwLock;

use crate::config::schema::RedisConfig;

/// Connect to Redis, giving up after `timeout`.
pub async fn connect(config: &RedisConfig, timeout: Duration) -> Result<Client, Error> {
    let redis_config = Config::from_url(&config.url)?;
    let client = Client::new(redis_config, None, None, None);
    client.connect();

    match tokio::time::timeout(timeout, client.wait_for_connect()).await {
        Ok(Ok(())) => {
            tracing::info!(url = %config.url, "Connected to Redis");
            Ok(client)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            let _ = client.quit().await;
            Err(Error::new(
                ErrorKind::Timeout,
                format!("no connection within {}ms", timeout.as_millis()),
            ))
        }
    }
}

/// A Lua script executed via EVALSHA.
pub struct LuaScript {
    source: &'static str,
    sha: RwLock<Option<String>>,
}

impl LuaScript {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            sha: RwLock::const_new(None),
        }
    }

    async fn load(&self, client: &Client) -> Result<String, Error> {
        let sha: String = client.script_load(self.source).await?;
        *self.sha.write().await = Some(sha.clone());
        Ok(sha)
    }

    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    /// Run the script, loading it first if needed and once more on NOSCRIPT.
    pub async fn exec<R>(
        &self,
        client: &Client,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<R, Error>
    where
        R: FromValue,
    {
        let cached = self.sha.read().await.clone();
        let sha = match cached {
            Some(sha) => sha,
            None => self.load(client).await?,
        };

        match client.evalsha(&sha, keys.clone(), args.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if Self::is_noscript_error(&e) => {
                tracing::warn!("NOSCRIPT error, reloading Lua script");
                let sha = self.load(client).await?;
                client.evalsha(&sha, keys, args).await
            }
            Err(e) => Err(e),
        }
    }
}

static CLEAR_PREFIX: LuaScript = LuaScript::new(include_str!("clear_prefix.lua"));
static COUNT_PREFIX: LuaScript = LuaScript::new("return #redis.call('KEYS', ARGV[1])");

/// Delete every key matching `pattern` (glob). Returns how many were removed.
pub async fn clear_matching(client: &Client, pattern: &str) -> Result<usize, Error> {
    let removed: i64 = CLEAR_PREFIX
        .exec(client, Vec::new(), vec![pattern.to_string()])
        .await?;
    Ok(usize::try_from(removed).unwrap_or(0))
}

/// Count keys matching `pattern` (glob).
pub async fn count_matching(client: &Client, pattern: &str) -> Result<usize, Error> {
    let count: i64 = COUNT_PREFIX
        .exec(client, Vec::new(), vec![pattern.to_string()])
        .await?;
    Ok(usize::try_from(count).unwrap_or(0))
}
