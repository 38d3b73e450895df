/// 缓存数据模型
/// 定义会话哈希结构及编解码
pub mod session;

// 重新导出常用类型
pub use session::{AuthType, LoginType, Session};
