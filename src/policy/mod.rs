//! 会话策略：登录渠道 -> 过期时间，角色 -> 权限范围

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::models::LoginType;
use crate::config::Config;

/// 无权限
pub const NONE_SCOPE: u64 = 0;

/// 管理员权限
pub const ADMIN_SCOPE: u64 = 0xFFFF;

/// 各登录渠道的会话时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub web: Duration,
    pub app: Duration,
    pub wx: Duration,
    pub alipay: Duration,
}

impl ExpiryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            web: config.session_timeout_web(),
            app: config.session_timeout_app(),
            wx: config.session_timeout_wx(),
            alipay: config.session_timeout_alipay(),
        }
    }

    /// 未登记的渠道按 App 处理
    pub fn duration_for(&self, login_type: LoginType) -> Duration {
        match login_type {
            LoginType::Web => self.web,
            LoginType::App => self.app,
            LoginType::Wx => self.wx,
            LoginType::Alipay => self.alipay,
            LoginType::Unknown(_) => self.app,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 角色与权限范围映射
#[derive(Debug, Clone)]
pub struct RolePolicy {
    scopes: HashMap<String, u64>,
    default_role: String,
}

impl RolePolicy {
    pub fn new(default_role: impl Into<String>) -> Self {
        let mut scopes = HashMap::new();
        scopes.insert("admin".to_string(), ADMIN_SCOPE);
        Self {
            scopes,
            default_role: default_role.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_role.clone())
    }

    pub fn with_role(mut self, role: impl Into<String>, scope: u64) -> Self {
        self.scopes.insert(role.into(), scope);
        self
    }

    /// 未登记角色返回 NONE_SCOPE
    pub fn scope_for(&self, role: &str) -> u64 {
        self.scopes.get(role).copied().unwrap_or(NONE_SCOPE)
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    pub fn default_scope(&self) -> u64 {
        self.scope_for(&self.default_role)
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_channel_has_its_own_duration() {
        let policy = ExpiryPolicy::default();
        let durations = [
            policy.duration_for(LoginType::Web),
            policy.duration_for(LoginType::App),
            policy.duration_for(LoginType::Wx),
            policy.duration_for(LoginType::Alipay),
        ];
        for (i, a) in durations.iter().enumerate() {
            for b in durations.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(policy.duration_for(LoginType::Web) > policy.duration_for(LoginType::App));
    }

    #[test]
    fn unknown_channel_falls_back_to_app() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.duration_for(LoginType::Unknown(42)), policy.app);
    }

    #[test]
    fn roles_map_to_scopes() {
        let policy = RolePolicy::new("admin").with_role("editor", 0b10);
        assert_eq!(policy.scope_for("admin"), ADMIN_SCOPE);
        assert_eq!(policy.scope_for("editor"), 0b10);
        assert_eq!(policy.scope_for("guest"), NONE_SCOPE);
        assert_eq!(policy.default_scope(), ADMIN_SCOPE);
    }

    #[test]
    fn default_role_is_configurable() {
        let policy = RolePolicy::new("guest");
        assert_eq!(policy.default_role(), "guest");
        assert_eq!(policy.default_scope(), NONE_SCOPE);
    }
}
