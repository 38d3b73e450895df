/// 缓存键模块
/// 提供会话相关缓存键生成函数

// 会话缓存键模块
pub mod session_keys;

// 重新导出常用的键类型和生成函数
pub use session_keys::{
    IndexKey, MAX_TOKENS_CONFIG_KEY, TokenBindingsKey, TokenKey, UserTokensKey, token_bindings_key,
    token_key, user_tokens_key,
};
