use std::sync::Arc;
use std::time::Duration;

use crate::cache::backend::SessionCache;
use crate::cache::keys::{IndexKey, MAX_TOKENS_CONFIG_KEY, token_bindings_key, token_key, user_tokens_key};
use crate::cache::models::{AuthType, LoginType, Session};
use crate::config::Config;
use crate::error::{CacheError, Result, SessionError};
use crate::policy::{ExpiryPolicy, RolePolicy};

fn read_err(op: &'static str, key: &str) -> impl FnOnce(CacheError) -> SessionError {
    let key = key.to_string();
    move |source| {
        tracing::error!("{} {} err: {}", op, key, source);
        SessionError::CacheRead { op, source }
    }
}

fn write_err(op: &'static str, key: &str) -> impl FnOnce(CacheError) -> SessionError {
    let key = key.to_string();
    move |source| {
        tracing::error!("{} {} err: {}", op, key, source);
        SessionError::CacheWrite { op, source }
    }
}

fn delete_err(op: &'static str, key: &str) -> impl FnOnce(CacheError) -> SessionError {
    let key = key.to_string();
    move |source| {
        tracing::error!("{} {} err: {}", op, key, source);
        SessionError::CacheDelete { op, source }
    }
}

/// 新建会话参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub login_type: LoginType,
    pub auth_type: AuthType,
    /// 为空时使用默认角色
    pub role: Option<String>,
}

impl Default for NewSession {
    fn default() -> Self {
        Self {
            login_type: LoginType::Web,
            auth_type: AuthType::Password,
            role: None,
        }
    }
}

/// 基于缓存的 token 会话存储
///
/// 维护三类键：token -> 会话哈希，用户 -> 活跃 token 集合，
/// token -> 引用它的索引键集合。组合操作不是原子的，
/// 以 token 键是否存在作为会话有效的唯一依据，悬挂的索引成员
/// 只会导致一次查不到会话的读取。
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    expiry: ExpiryPolicy,
    roles: RolePolicy,
    default_max_tokens: usize,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn SessionCache>, config: &Config) -> Self {
        Self::with_policies(
            cache,
            ExpiryPolicy::from_config(config),
            RolePolicy::from_config(config),
            config.max_tokens,
        )
    }

    pub fn with_policies(
        cache: Arc<dyn SessionCache>,
        expiry: ExpiryPolicy,
        roles: RolePolicy,
        default_max_tokens: usize,
    ) -> Self {
        Self {
            cache,
            expiry,
            roles,
            default_max_tokens,
        }
    }

    pub fn expiry_policy(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    pub fn role_policy(&self) -> &RolePolicy {
        &self.roles
    }

    /// 解析 token 对应的用户ID
    pub async fn get_auth_id(&self, token: &str) -> Result<u64> {
        let session = self.get_session_v2(token).await?;
        session
            .user_id
            .parse::<u64>()
            .map_err(|_| SessionError::InvalidUserId(session.user_id))
    }

    /// 读取会话，先检查键是否存在，避免把空哈希解码成零值会话
    pub async fn get_session_v2(&self, token: &str) -> Result<Session> {
        let key = token_key(token);
        let exists = self
            .cache
            .exists(key.as_str())
            .await
            .map_err(read_err("exists", key.as_str()))?;
        if !exists {
            return Err(SessionError::TokenInvalid);
        }

        let fields = self
            .cache
            .hgetall(key.as_str())
            .await
            .map_err(read_err("hgetall", key.as_str()))?;
        // EXISTS 与 HGETALL 之间过期
        if fields.is_empty() {
            return Err(SessionError::TokenInvalid);
        }

        Session::decode(&fields).map_err(|e| {
            tracing::error!("decode session {} err: {}", key, e);
            SessionError::Decode(e)
        })
    }

    // 索引维护操作要求会话存在，缺失时报 TokenNotFound
    async fn load_session(&self, token: &str) -> Result<Session> {
        self.get_session_v2(token).await.map_err(|e| match e {
            SessionError::TokenInvalid => SessionError::TokenNotFound,
            other => other,
        })
    }

    /// 是否已达到最大登录设备数
    pub async fn is_user_token_over(&self, user_id: &str) -> Result<bool> {
        let count = self.user_token_count(user_id).await?;
        let max = self.user_token_max_count().await;
        tracing::debug!("user {} token count {} max count {}", user_id, count, max);
        Ok(count >= max)
    }

    /// 当前登录数量
    pub async fn user_token_count(&self, user_id: &str) -> Result<usize> {
        let key = user_tokens_key(user_id);
        self.cache
            .scard(key.as_str())
            .await
            .map_err(read_err("scard", key.as_str()))
    }

    /// 最大登录限制，配置缺失或无法读取时使用默认值
    pub async fn user_token_max_count(&self) -> usize {
        match self.cache.get(MAX_TOKENS_CONFIG_KEY).await {
            Ok(Some(raw)) => match raw.trim().parse::<usize>() {
                Ok(max) => max,
                Err(_) => {
                    tracing::warn!(
                        "malformed {} value {:?}, using default {}",
                        MAX_TOKENS_CONFIG_KEY,
                        raw,
                        self.default_max_tokens
                    );
                    self.default_max_tokens
                }
            },
            Ok(None) => self.default_max_tokens,
            Err(e) => {
                tracing::warn!(
                    "read {} err: {}, using default {}",
                    MAX_TOKENS_CONFIG_KEY,
                    e,
                    self.default_max_tokens
                );
                self.default_max_tokens
            }
        }
    }

    pub async fn set_user_token_max_count(&self, max: usize) -> Result<()> {
        self.cache
            .set(MAX_TOKENS_CONFIG_KEY, &max.to_string())
            .await
            .map_err(write_err("set", MAX_TOKENS_CONFIG_KEY))
    }

    /// 用户当前的活跃 token
    pub async fn user_tokens(&self, user_id: &str) -> Result<Vec<String>> {
        let key = user_tokens_key(user_id);
        self.cache
            .smembers(key.as_str())
            .await
            .map_err(read_err("smembers", key.as_str()))
    }

    /// 以默认渠道和默认角色缓存 token，不写索引也不设置过期
    pub async fn to_cache(&self, token: &str, user_id: u64) -> Result<Session> {
        self.to_cache_with(token, user_id, &NewSession::default()).await
    }

    pub async fn to_cache_with(&self, token: &str, user_id: u64, new: &NewSession) -> Result<Session> {
        let scope = match &new.role {
            Some(role) => self.roles.scope_for(role),
            None => self.roles.default_scope(),
        };
        let session = Session {
            user_id: user_id.to_string(),
            login_type: new.login_type,
            auth_type: new.auth_type,
            creation_date: chrono::Utc::now().timestamp(),
            // 过期由 token 键 TTL 决定，这里不写提示值
            expires_in: 0,
            scope,
        };

        let key = token_key(token);
        self.cache
            .hset_multiple(key.as_str(), &session.encode())
            .await
            .map_err(write_err("hset", key.as_str()))?;
        tracing::debug!("cached token for user {} via {}", session.user_id, session.login_type);
        Ok(session)
    }

    /// 同步 token 到用户索引
    ///
    /// 第二次写入失败时用户集合中会留下悬挂成员，可重试或执行清理。
    pub async fn sync_user_token_cache(&self, token: &str) -> Result<()> {
        let session = self.load_session(token).await?;

        let user_key = user_tokens_key(&session.user_id);
        self.cache
            .sadd(user_key.as_str(), token)
            .await
            .map_err(write_err("sadd", user_key.as_str()))?;

        let bind_key = token_bindings_key(token);
        self.cache
            .sadd(bind_key.as_str(), user_key.as_str())
            .await
            .map_err(write_err("sadd", bind_key.as_str()))?;
        Ok(())
    }

    /// 按登录渠道刷新 token 键过期时间，索引键不设置过期
    pub async fn update_user_token_cache_expire(&self, token: &str) -> Result<()> {
        let session = self.load_session(token).await?;
        let ttl = self.expiry.duration_for(session.login_type);

        let key = token_key(token);
        let applied = self
            .cache
            .expire(key.as_str(), ttl)
            .await
            .map_err(write_err("expire", key.as_str()))?;
        if !applied {
            return Err(SessionError::TokenNotFound);
        }
        tracing::debug!("token for user {} expires in {}s", session.user_id, ttl.as_secs());
        Ok(())
    }

    /// token 键剩余过期时间
    pub async fn token_ttl(&self, token: &str) -> Result<Option<Duration>> {
        let key = token_key(token);
        self.cache
            .ttl(key.as_str())
            .await
            .map_err(read_err("ttl", key.as_str()))
    }

    /// 从用户集合移除 token 后删除 token 缓存
    pub async fn del_user_token_cache(&self, token: &str) -> Result<()> {
        let session = self.load_session(token).await?;

        let user_key = user_tokens_key(&session.user_id);
        self.cache
            .srem(user_key.as_str(), token)
            .await
            .map_err(delete_err("srem", user_key.as_str()))?;

        self.del_token_cache(token).await
    }

    /// 删除绑定集合和 token 键，不处理用户集合
    pub async fn del_token_cache(&self, token: &str) -> Result<()> {
        let bind_key = token_bindings_key(token);
        self.cache
            .del(bind_key.as_str())
            .await
            .map_err(delete_err("del", bind_key.as_str()))?;

        let key = token_key(token);
        self.cache
            .del(key.as_str())
            .await
            .map_err(delete_err("del", key.as_str()))?;
        Ok(())
    }

    /// 清空用户全部 token，返回清理的数量
    ///
    /// 逐个删除，中途失败时剩余 token 保持原状。
    pub async fn clean_user_token_cache(&self, token: &str) -> Result<usize> {
        let session = self.load_session(token).await?;

        let user_key = user_tokens_key(&session.user_id);
        let tokens = self
            .cache
            .smembers(user_key.as_str())
            .await
            .map_err(read_err("smembers", user_key.as_str()))?;
        self.cache
            .del(user_key.as_str())
            .await
            .map_err(delete_err("del", user_key.as_str()))?;

        for t in &tokens {
            self.del_token_cache(t).await?;
        }
        tracing::debug!("cleaned {} tokens for user {}", tokens.len(), session.user_id);
        Ok(tokens.len())
    }

    /// 从所有绑定的索引中移除 token 并删除绑定集合，token 键保留
    pub async fn user_token_expired(&self, token: &str) -> Result<()> {
        let bind_key = token_bindings_key(token);
        let members = self
            .cache
            .smembers(bind_key.as_str())
            .await
            .map_err(read_err("smembers", bind_key.as_str()))?;

        for raw in &members {
            match IndexKey::parse(raw) {
                Some(IndexKey::UserTokens(user_key)) => {
                    self.cache
                        .srem(user_key.as_str(), token)
                        .await
                        .map_err(delete_err("srem", user_key.as_str()))?;
                }
                None => tracing::debug!("skip unknown index key {} in {}", raw, bind_key),
            }
        }

        self.cache
            .del(bind_key.as_str())
            .await
            .map_err(delete_err("del", bind_key.as_str()))?;
        Ok(())
    }

    /// 登录流程：检查设备数，写会话，同步索引，设置过期
    ///
    /// 达到上限时拒绝登录，淘汰旧会话由调用方决定。
    pub async fn login(&self, token: &str, user_id: u64, new: &NewSession) -> Result<Session> {
        let uid = user_id.to_string();
        if self.is_user_token_over(&uid).await? {
            let count = self.user_token_count(&uid).await?;
            let max = self.user_token_max_count().await;
            tracing::info!("user {} rejected at device limit {}/{}", uid, count, max);
            return Err(SessionError::DeviceLimitExceeded {
                user_id: uid,
                count,
                max,
            });
        }

        let session = self.to_cache_with(token, user_id, new).await?;
        self.sync_user_token_cache(token).await?;
        self.update_user_token_cache_expire(token).await?;
        Ok(session)
    }

    /// 缓存连通性检查
    pub async fn ping(&self) -> Result<()> {
        self.cache
            .execute("PING", &[])
            .await
            .map(|_| ())
            .map_err(read_err("ping", "-"))
    }

    /// 释放缓存连接，可重复调用
    pub async fn close(&self) {
        self.cache.close().await;
    }
}
