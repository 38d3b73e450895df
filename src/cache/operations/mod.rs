/// 缓存操作
/// 会话及其索引的读写与清理
pub mod session;

pub use session::{NewSession, SessionStore};
