// 缓存模块
// 包含缓存键、会话数据结构、缓存后端和会话操作

pub mod backend;
pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use backend::{MemoryCache, RedisCache, SessionCache};
pub use models::{AuthType, LoginType, Session};
pub use operations::{NewSession, SessionStore};
