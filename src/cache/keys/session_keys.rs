use std::fmt;

/// token 会话缓存键前缀
const TOKEN_PREFIX: &str = "session:token:";

/// 用户 token 集合键前缀
const USER_TOKENS_PREFIX: &str = "session:user:";

/// token 绑定索引集合键前缀
const TOKEN_BINDINGS_PREFIX: &str = "session:bind:";

/// 最大登录设备数配置键
pub const MAX_TOKENS_CONFIG_KEY: &str = "session:config:max_tokens";

macro_rules! cache_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

cache_key! {
    /// token -> 会话哈希
    TokenKey
}

cache_key! {
    /// 用户 -> 活跃 token 集合
    UserTokensKey
}

cache_key! {
    /// token -> 引用该 token 的索引键集合
    TokenBindingsKey
}

/// 生成 token 会话缓存键
pub fn token_key(token: &str) -> TokenKey {
    TokenKey(format!("{}{}", TOKEN_PREFIX, token))
}

/// 生成用户 token 集合键
pub fn user_tokens_key(user_id: &str) -> UserTokensKey {
    UserTokensKey(format!("{}{}", USER_TOKENS_PREFIX, user_id))
}

/// 生成 token 绑定索引集合键
pub fn token_bindings_key(token: &str) -> TokenBindingsKey {
    TokenBindingsKey(format!("{}{}", TOKEN_BINDINGS_PREFIX, token))
}

impl UserTokensKey {
    /// 键中编码的用户ID
    pub fn user_id(&self) -> &str {
        &self.0[USER_TOKENS_PREFIX.len()..]
    }
}

/// 绑定集合中记录的索引键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    UserTokens(UserTokensKey),
}

impl IndexKey {
    /// 解析绑定集合成员，无法识别的成员返回 None
    pub fn parse(raw: &str) -> Option<IndexKey> {
        match raw.strip_prefix(USER_TOKENS_PREFIX) {
            Some(user_id) if !user_id.is_empty() => Some(IndexKey::UserTokens(user_tokens_key(user_id))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IndexKey::UserTokens(key) => key.as_str(),
        }
    }
}

impl From<UserTokensKey> for IndexKey {
    fn from(key: UserTokensKey) -> Self {
        IndexKey::UserTokens(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_do_not_collide() {
        let token = "abc";
        let keys = [
            token_key(token).to_string(),
            user_tokens_key(token).to_string(),
            token_bindings_key(token).to_string(),
            MAX_TOKENS_CONFIG_KEY.to_string(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
                assert!(!a.starts_with(b.as_str()) && !b.starts_with(a.as_str()));
            }
        }
    }

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(token_key("t1"), token_key("t1"));
        assert_eq!(user_tokens_key("42").as_str(), "session:user:42");
        assert_eq!(user_tokens_key("42").user_id(), "42");
    }

    #[test]
    fn parses_user_tokens_index_key() {
        let key = user_tokens_key("7");
        assert_eq!(IndexKey::parse(key.as_str()), Some(IndexKey::UserTokens(key)));
    }

    #[test]
    fn ignores_unknown_index_members() {
        assert_eq!(IndexKey::parse(token_key("x").as_str()), None);
        assert_eq!(IndexKey::parse(token_bindings_key("x").as_str()), None);
        assert_eq!(IndexKey::parse("session:user:"), None);
        assert_eq!(IndexKey::parse("garbage"), None);
    }
}
