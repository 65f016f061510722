use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use vaultgate_state::error::StateError;
use vaultgate_state::key::{KeyKind, StateKey};
use vaultgate_state::store::StateStore;

use crate::config::RedisConfig;
use crate::key_render::{render_key, strip_prefix, timeout_index_key};

fn backend(e: &redis::RedisError) -> StateError {
    StateError::Backend(e.to_string())
}

fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Redis-backed implementation of [`StateStore`].
///
/// Values are plain Redis strings. `check_and_set` maps to `SET NX PX`, the
/// due-time index is a sorted set scored by milliseconds.
pub struct RedisStateStore {
    pool: Pool,
    prefix: String,
}

impl RedisStateStore {
    /// Create a new `RedisStateStore` from the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, StateError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| StateError::Connection(e.to_string()))?
            .map_err(|e| StateError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
        })
    }

    fn key(&self, key: &StateKey) -> String {
        render_key(&self.prefix, key)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, StateError> {
        self.pool
            .get()
            .await
            .map_err(|e| StateError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let redis_key = self.key(key);
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value).arg("NX");
        if let Some(d) = ttl {
            cmd.arg("PX").arg(ttl_ms(d));
        }
        // `SET NX` replies OK when it wrote and nil when the key existed.
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| backend(&e))?;

        Ok(reply.is_some())
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        let mut conn = self.conn().await?;
        conn.get(self.key(key)).await.map_err(|e| backend(&e))
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let redis_key = self.key(key);
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value);
        if let Some(d) = ttl {
            cmd.arg("PX").arg(ttl_ms(d));
        }
        let () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| backend(&e))?;

        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.del(self.key(key)).await.map_err(|e| backend(&e))?;
        Ok(deleted > 0)
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let redis_key = self.key(key);
        let mut conn = self.conn().await?;

        let new_val: i64 = conn
            .incr(&redis_key, delta)
            .await
            .map_err(|e| backend(&e))?;

        if let Some(d) = ttl {
            let () = conn
                .pexpire(&redis_key, ttl_ms(d))
                .await
                .map_err(|e| backend(&e))?;
        }

        Ok(new_val)
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        let pattern = format!(
            "{}:{}*",
            self.prefix,
            StateKey::scan_prefix(namespace, &kind, prefix)
        );

        let mut conn = self.conn().await?;
        let mut results = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| backend(&e))?;

            for key in keys {
                // The key may have expired or been deleted since SCAN saw it.
                let value: Option<String> = conn.get(&key).await.map_err(|e| backend(&e))?;
                if let Some(value) = value {
                    results.push((strip_prefix(&self.prefix, &key).to_owned(), value));
                }
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(results)
    }

    async fn index_timeout(&self, key: &StateKey, due_at_ms: i64) -> Result<(), StateError> {
        let mut conn = self.conn().await?;

        // ZADD timeout_index:<kind> <score=due_at_ms> <member=canonical_key>
        redis::cmd("ZADD")
            .arg(timeout_index_key(&self.prefix, &key.kind))
            .arg(due_at_ms)
            .arg(key.canonical())
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| backend(&e))?;

        Ok(())
    }

    async fn remove_timeout_index(&self, key: &StateKey) -> Result<(), StateError> {
        let mut conn = self.conn().await?;

        redis::cmd("ZREM")
            .arg(timeout_index_key(&self.prefix, &key.kind))
            .arg(key.canonical())
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| backend(&e))?;

        Ok(())
    }

    async fn get_expired_timeouts(
        &self,
        kind: KeyKind,
        now_ms: i64,
    ) -> Result<Vec<String>, StateError> {
        let mut conn = self.conn().await?;

        // ZRANGEBYSCORE timeout_index:<kind> -inf <now_ms>
        redis::cmd("ZRANGEBYSCORE")
            .arg(timeout_index_key(&self.prefix, &kind))
            .arg("-inf")
            .arg(now_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend(&e))
    }
}

#[cfg(all(test, feature = "integration"))]
mod tests {
    use vaultgate_state::testing::run_store_conformance_tests;

    use super::*;

    fn store() -> RedisStateStore {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
        let config = RedisConfig {
            url,
            prefix: format!("vaultgate-test-{}", std::process::id()),
            ..RedisConfig::default()
        };
        RedisStateStore::new(&config).expect("pool should build")
    }

    #[tokio::test]
    async fn conformance() {
        run_store_conformance_tests(&store())
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn check_and_set_with_ttl_expires() {
        let store = store();
        let key = StateKey::new("test-ns", KeyKind::Claim, "ttl");
        assert!(
            store
                .check_and_set(&key, "x", Some(Duration::from_millis(50)))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.check_and_set(&key, "y", None).await.unwrap());
    }
}
