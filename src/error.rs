use thiserror::Error;

/// 缓存层错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("缓存连接已关闭")]
    Closed,

    #[error("不支持的缓存命令: {0}")]
    Unsupported(String),

    #[error("过期时间超出范围: {0:?}")]
    TtlOutOfRange(std::time::Duration),
}

/// 会话哈希解码错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("会话缺少字段 `{0}`")]
    MissingField(&'static str),

    #[error("会话字段 `{field}` 格式错误: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// 会话存储错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// token 对应的会话不存在，需重新登录
    #[error("登录已失效，请重新登录")]
    TokenInvalid,

    #[error("token 缓存不存在")]
    TokenNotFound,

    #[error("会话数据损坏: {0}")]
    Decode(#[from] DecodeError),

    #[error("读取缓存失败 ({op}): {source}")]
    CacheRead {
        op: &'static str,
        #[source]
        source: CacheError,
    },

    #[error("写入缓存失败 ({op}): {source}")]
    CacheWrite {
        op: &'static str,
        #[source]
        source: CacheError,
    },

    #[error("删除缓存失败 ({op}): {source}")]
    CacheDelete {
        op: &'static str,
        #[source]
        source: CacheError,
    },

    #[error("用户ID格式无效: {0}")]
    InvalidUserId(String),

    #[error("用户 {user_id} 登录设备数已达上限 ({count}/{max})")]
    DeviceLimitExceeded {
        user_id: String,
        count: usize,
        max: usize,
    },
}

impl SessionError {
    /// token 缺失类错误，调用方应提示重新登录
    pub fn is_token_missing(&self) -> bool {
        matches!(self, SessionError::TokenInvalid | SessionError::TokenNotFound)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
