pub mod cache;
pub mod config;
pub mod error;
pub mod policy;

pub use cache::{AuthType, LoginType, MemoryCache, NewSession, RedisCache, Session, SessionCache, SessionStore};
pub use config::Config;
pub use error::{CacheError, DecodeError, Result, SessionError};
