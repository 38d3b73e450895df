use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::RwLock;

use super::{CacheResult, SessionCache};
use crate::error::CacheError;

/// Redis 缓存后端
pub struct RedisCache {
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = RedisClient::open(redis_url)?;
        Self::from_client(&client).await
    }

    pub async fn from_client(client: &RedisClient) -> CacheResult<Self> {
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::debug!("Redis session cache connected");
        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    // 多路复用连接克隆开销很小，每次操作取一份
    async fn conn(&self) -> CacheResult<MultiplexedConnection> {
        self.conn.read().await.clone().ok_or(CacheError::Closed)
    }
}

// EXPIRE 的秒数为 i64，负数会让 Redis 立即删除键
fn expire_secs(ttl: Duration) -> CacheResult<i64> {
    i64::try_from(ttl.as_secs()).map_err(|_| CacheError::TtlOutOfRange(ttl))
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&'static str, String)]) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(key).await?)
    }

    async fn scard(&self, key: &str) -> CacheResult<usize> {
        let mut conn = self.conn().await?;
        Ok(conn.scard(key).await?)
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let secs = expire_secs(ttl)?;
        let mut conn = self.conn().await?;
        let applied: i64 = conn.expire(key, secs).await?;
        Ok(applied > 0)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.conn().await?;
        let secs: i64 = conn.ttl(key).await?;
        // -2 键不存在，-1 未设置过期
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }

    async fn execute(&self, command: &str, args: &[String]) -> CacheResult<redis::Value> {
        let mut conn = self.conn().await?;
        Ok(redis::cmd(command).arg(args).query_async(&mut conn).await?)
    }

    async fn close(&self) {
        if self.conn.write().await.take().is_some() {
            tracing::debug!("Redis session cache connection released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_seconds_must_fit_i64() {
        assert_eq!(expire_secs(Duration::from_secs(7200)).unwrap(), 7200);
        assert_eq!(expire_secs(Duration::from_secs(i64::MAX as u64)).unwrap(), i64::MAX);
        assert!(matches!(
            expire_secs(Duration::from_secs(i64::MAX as u64 + 1)),
            Err(CacheError::TtlOutOfRange(_))
        ));
        assert!(matches!(
            expire_secs(Duration::from_secs(u64::MAX)),
            Err(CacheError::TtlOutOfRange(_))
        ));
    }

    // 需要本地 Redis: docker run -d -p 6379:6379 redis:7

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_hash_and_set_primitives() -> CacheResult<()> {
        let cache = RedisCache::connect("redis://localhost:6379").await?;

        cache
            .hset_multiple("session:test:hash", &[("user_id", "1".to_string())])
            .await?;
        assert!(cache.exists("session:test:hash").await?);
        assert_eq!(
            cache.hgetall("session:test:hash").await?.get("user_id").map(String::as_str),
            Some("1")
        );

        assert!(cache.expire("session:test:hash", Duration::from_secs(30)).await?);
        let ttl = cache.ttl("session:test:hash").await?;
        assert!(ttl.is_some_and(|t| t.as_secs() <= 30 && t.as_secs() > 0));

        assert!(cache.sadd("session:test:set", "a").await?);
        assert_eq!(cache.scard("session:test:set").await?, 1);
        assert!(cache.srem("session:test:set", "a").await?);

        cache.del("session:test:hash").await?;
        cache.close().await;
        cache.close().await;
        assert!(matches!(cache.exists("x").await, Err(CacheError::Closed)));
        Ok(())
    }
}
