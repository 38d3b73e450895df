use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{ErrorKind, RedisError};
use tokio::sync::RwLock;

use super::{CacheResult, SessionCache};
use crate::error::CacheError;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内缓存实现，按 Redis 语义模拟哈希、集合与 TTL
///
/// 用于测试和本地开发，过期键在访问时惰性清除。
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    closed: AtomicBool,
}

fn wrong_type() -> CacheError {
    CacheError::Redis(RedisError::from((
        ErrorKind::TypeError,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )))
}

// 返回未过期的条目，已过期的顺手删除
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    /// 当前存活的键数量
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        Ok(live(&mut entries, key).is_some())
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&'static str, String)]) -> CacheResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        if live(&mut entries, key).is_none() {
            entries.insert(key.to_string(), Entry::new(Value::Hash(HashMap::new())));
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Hash(hash)) => {
                for (field, value) in fields {
                    hash.insert(field.to_string(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type()),
        }
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.ensure_open()?;
        // SET 会覆盖任意类型并清除 TTL
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry::new(Value::Str(value.to_string())));
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        if live(&mut entries, key).is_none() {
            entries.insert(key.to_string(), Entry::new(Value::Set(HashSet::new())));
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Set(set)) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type()),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        let (removed, now_empty) = match live(&mut entries, key).map(|e| &mut e.value) {
            None => return Ok(false),
            Some(Value::Set(set)) => (set.remove(member), set.is_empty()),
            Some(_) => return Err(wrong_type()),
        };
        // Redis 会删除空集合
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn scard(&self, key: &str) -> CacheResult<usize> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len()),
            Some(_) => Err(wrong_type()),
        }
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        let existed = live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.ensure_open()?;
        // 与 Redis 一致，秒数必须能放进 i64
        if i64::try_from(ttl.as_secs()).is_err() {
            return Err(CacheError::TtlOutOfRange(ttl));
        }
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;
        let mut entries = self.entries.write().await;
        match live(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        Ok(live(&mut entries, key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn execute(&self, command: &str, args: &[String]) -> CacheResult<redis::Value> {
        self.ensure_open()?;
        match (command.to_ascii_uppercase().as_str(), args) {
            ("PING", []) => Ok(redis::Value::SimpleString("PONG".to_string())),
            ("PING", [message]) => Ok(redis::Value::BulkString(message.clone().into_bytes())),
            ("SREM", [key, members @ ..]) => {
                let mut removed = 0;
                for member in members {
                    if self.srem(key, member).await? {
                        removed += 1;
                    }
                }
                Ok(redis::Value::Int(removed))
            }
            _ => Err(CacheError::Unsupported(command.to_string())),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_keys_disappear() {
        let cache = MemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert!(cache.expire("k", Duration::ZERO).await.unwrap());
        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time() {
        let cache = MemoryCache::new();
        cache.hset_multiple("h", &[("f", "1".to_string())]).await.unwrap();
        assert_eq!(cache.ttl("h").await.unwrap(), None);
        cache.expire("h", Duration::from_secs(60)).await.unwrap();
        let ttl = cache.ttl("h").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(58));
        assert!(!cache.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_ttl_is_rejected() {
        let cache = MemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert!(matches!(
            cache.expire("k", Duration::from_secs(u64::MAX)).await,
            Err(CacheError::TtlOutOfRange(_))
        ));
        assert!(matches!(
            cache.expire("k", Duration::from_secs(i64::MAX as u64 + 1)).await,
            Err(CacheError::TtlOutOfRange(_))
        ));
        assert!(cache.exists("k").await.unwrap());
        assert_eq!(cache.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn removing_last_member_drops_set() {
        let cache = MemoryCache::new();
        assert!(cache.sadd("s", "a").await.unwrap());
        assert!(!cache.sadd("s", "a").await.unwrap());
        assert!(cache.srem("s", "a").await.unwrap());
        assert!(!cache.exists("s").await.unwrap());
        assert_eq!(cache.scard("s").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_type_is_an_error() {
        let cache = MemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert!(cache.sadd("k", "a").await.is_err());
        assert!(cache.hgetall("k").await.is_err());
    }

    #[tokio::test]
    async fn execute_supports_ping_and_srem() {
        let cache = MemoryCache::new();
        assert_eq!(
            cache.execute("ping", &[]).await.unwrap(),
            redis::Value::SimpleString("PONG".to_string())
        );
        cache.sadd("s", "a").await.unwrap();
        cache.sadd("s", "b").await.unwrap();
        let args = ["s".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(cache.execute("SREM", &args).await.unwrap(), redis::Value::Int(1));
        assert!(matches!(
            cache.execute("FLUSHALL", &[]).await,
            Err(CacheError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn closed_cache_rejects_operations() {
        let cache = MemoryCache::new();
        cache.close().await;
        cache.close().await;
        assert!(matches!(cache.exists("k").await, Err(CacheError::Closed)));
    }
}
