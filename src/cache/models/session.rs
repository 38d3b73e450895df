use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const FIELD_USER_ID: &str = "user_id";
const FIELD_LOGIN_TYPE: &str = "login_type";
const FIELD_AUTH_TYPE: &str = "auth_type";
const FIELD_CREATION_DATE: &str = "creation_date";
const FIELD_EXPIRES_IN: &str = "expires_in";
const FIELD_SCOPE: &str = "scope";

/// 登录渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Web,
    App,
    Wx,
    Alipay,
    /// 未登记的渠道编码，过期策略按 App 处理
    Unknown(u32),
}

impl LoginType {
    pub fn code(self) -> u32 {
        match self {
            LoginType::Web => 1,
            LoginType::App => 2,
            LoginType::Wx => 3,
            LoginType::Alipay => 4,
            LoginType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => LoginType::Web,
            2 => LoginType::App,
            3 => LoginType::Wx,
            4 => LoginType::Alipay,
            other => LoginType::Unknown(other),
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginType::Web => f.write_str("web"),
            LoginType::App => f.write_str("app"),
            LoginType::Wx => f.write_str("wx"),
            LoginType::Alipay => f.write_str("alipay"),
            LoginType::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// 认证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Password,
    Sms,
    ThirdParty,
}

impl AuthType {
    pub fn code(self) -> u32 {
        match self {
            AuthType::Password => 1,
            AuthType::Sms => 2,
            AuthType::ThirdParty => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(AuthType::Password),
            2 => Some(AuthType::Sms),
            3 => Some(AuthType::ThirdParty),
            _ => None,
        }
    }
}

/// 会话缓存数据模型，以哈希形式存放在 token 键下
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub login_type: LoginType,
    pub auth_type: AuthType,
    pub creation_date: i64, // Unix timestamp
    /// 仅作提示，实际过期由缓存键 TTL 决定，0 表示未设置
    pub expires_in: i64,
    pub scope: u64,
}

impl Session {
    /// 编码为哈希字段列表
    pub fn encode(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_USER_ID, self.user_id.clone()),
            (FIELD_LOGIN_TYPE, self.login_type.code().to_string()),
            (FIELD_AUTH_TYPE, self.auth_type.code().to_string()),
            (FIELD_CREATION_DATE, self.creation_date.to_string()),
            (FIELD_EXPIRES_IN, self.expires_in.to_string()),
            (FIELD_SCOPE, self.scope.to_string()),
        ]
    }

    /// 从哈希字段解码，任一字段缺失或格式错误即失败
    pub fn decode(fields: &HashMap<String, String>) -> Result<Self, DecodeError> {
        let user_id = required(fields, FIELD_USER_ID)?;
        if user_id.is_empty() {
            return Err(DecodeError::InvalidField {
                field: FIELD_USER_ID,
                value: String::new(),
            });
        }

        let auth_code: u32 = parse_field(fields, FIELD_AUTH_TYPE)?;
        let auth_type = AuthType::from_code(auth_code).ok_or_else(|| DecodeError::InvalidField {
            field: FIELD_AUTH_TYPE,
            value: auth_code.to_string(),
        })?;

        Ok(Session {
            user_id: user_id.to_string(),
            login_type: LoginType::from_code(parse_field(fields, FIELD_LOGIN_TYPE)?),
            auth_type,
            creation_date: parse_field(fields, FIELD_CREATION_DATE)?,
            expires_in: parse_field(fields, FIELD_EXPIRES_IN)?,
            scope: parse_field(fields, FIELD_SCOPE)?,
        })
    }
}

fn required<'a>(fields: &'a HashMap<String, String>, field: &'static str) -> Result<&'a str, DecodeError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(DecodeError::MissingField(field))
}

fn parse_field<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, DecodeError> {
    let raw = required(fields, field)?;
    raw.trim().parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: raw.to_string(),
    })
}
