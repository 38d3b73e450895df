use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 默认最大登录设备数
pub const DEFAULT_MAX_TOKENS: usize = 10;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub session_timeout_web_secs: u64,
    pub session_timeout_app_secs: u64,
    pub session_timeout_wx_secs: u64,
    pub session_timeout_alipay_secs: u64,
    pub max_tokens: usize,
    pub default_role: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            session_timeout_web_secs: 7 * 24 * 3600,
            session_timeout_app_secs: 24 * 3600,
            session_timeout_wx_secs: 2 * 3600,
            session_timeout_alipay_secs: 3 * 3600,
            max_tokens: DEFAULT_MAX_TOKENS,
            default_role: "admin".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            session_timeout_web_secs: timeout_or("SESSION_TIMEOUT_WEB", defaults.session_timeout_web_secs),
            session_timeout_app_secs: timeout_or("SESSION_TIMEOUT_APP", defaults.session_timeout_app_secs),
            session_timeout_wx_secs: timeout_or("SESSION_TIMEOUT_WX", defaults.session_timeout_wx_secs),
            session_timeout_alipay_secs: timeout_or(
                "SESSION_TIMEOUT_ALIPAY",
                defaults.session_timeout_alipay_secs,
            ),
            max_tokens: parse_or("SESSION_MAX_TOKENS", defaults.max_tokens),
            default_role: env::var("SESSION_DEFAULT_ROLE").unwrap_or(defaults.default_role),
        })
    }

    pub fn session_timeout_web(&self) -> Duration {
        Duration::from_secs(self.session_timeout_web_secs)
    }

    pub fn session_timeout_app(&self) -> Duration {
        Duration::from_secs(self.session_timeout_app_secs)
    }

    pub fn session_timeout_wx(&self) -> Duration {
        Duration::from_secs(self.session_timeout_wx_secs)
    }

    pub fn session_timeout_alipay(&self) -> Duration {
        Duration::from_secs(self.session_timeout_alipay_secs)
    }
}

// 环境变量缺失或格式错误时使用默认值
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    parse_value(name, env::var(name).ok(), default)
}

fn parse_value<T: FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", name, raw);
            default
        }),
        None => default,
    }
}

fn timeout_or(name: &str, default: u64) -> u64 {
    timeout_value(name, env::var(name).ok(), default)
}

// 会话时长最终作为 EXPIRE 的 i64 秒数下发
fn timeout_value(name: &str, raw: Option<String>, default: u64) -> u64 {
    let secs = parse_value(name, raw, default);
    if i64::try_from(secs).is_err() {
        tracing::warn!("Timeout {} of {}s is out of range, using default", name, secs);
        return default;
    }
    secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_accepts_valid_seconds() {
        assert_eq!(timeout_value("T", Some(" 3600 ".to_string()), 60), 3600);
        assert_eq!(timeout_value("T", Some(i64::MAX.to_string()), 60), i64::MAX as u64);
        assert_eq!(timeout_value("T", None, 60), 60);
    }

    #[test]
    fn timeout_out_of_range_falls_back() {
        assert_eq!(timeout_value("T", Some(u64::MAX.to_string()), 60), 60);
        assert_eq!(timeout_value("T", Some((i64::MAX as u64 + 1).to_string()), 60), 60);
        assert_eq!(timeout_value("T", Some("-5".to_string()), 60), 60);
        assert_eq!(timeout_value("T", Some("2h".to_string()), 60), 60);
    }

    #[test]
    fn malformed_values_fall_back() {
        assert_eq!(parse_value("N", Some("ten".to_string()), 10usize), 10);
        assert_eq!(parse_value("N", Some("3".to_string()), 10usize), 3);
    }
}
