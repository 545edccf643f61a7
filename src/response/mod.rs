//! 响应：配置、注册表、执行器、多轮会话

pub mod config;
pub mod registry;
pub mod runner;
pub mod session;

pub use self::config::{Instructions, ResponseConfiguration};
pub use registry::{default_registry, reset_default_registry, ResponseRegistry};
pub use runner::{ResponseOutput, ResponseRunner, MAX_TOOL_ROUNDS};
pub use session::{EntryRole, HistoryEntry, ResponseSession, SessionRecord};
