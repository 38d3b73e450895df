//! 缓存后端
//! 会话存储依赖的缓存原语，每个原语本身是原子的
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

pub mod memory;
pub mod redis_cache;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn hset_multiple(&self, key: &str, fields: &[(&'static str, String)]) -> CacheResult<()>;

    /// 键不存在时返回空表
    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// 返回成员是否为新增
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// 返回成员是否存在并被移除
    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool>;

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    async fn scard(&self, key: &str) -> CacheResult<usize>;

    /// 返回键是否存在并被删除
    async fn del(&self, key: &str) -> CacheResult<bool>;

    /// 返回是否设置成功，键不存在时为 false
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// 剩余过期时间，键不存在或未设置过期时返回 None
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// 执行没有类型化封装的命令
    async fn execute(&self, command: &str, args: &[String]) -> CacheResult<::redis::Value>;

    /// 释放连接，可重复调用
    async fn close(&self);
}
