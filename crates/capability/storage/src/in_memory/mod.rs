//! 内存存储实现模块
//!
//! 用于单机运行和测试，进程退出即丢失。
//!
//! 包含以下实现：
//! - ListenerStore: InMemoryListenerStore
//! - DecodeScriptStore: InMemoryDecodeScriptStore
//! - PushStore: InMemoryPushStore

pub mod listener;
pub mod push;
pub mod script;
mod table;

pub use listener::*;
pub use push::*;
pub use script::*;
