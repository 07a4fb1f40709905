//! Handlers 模块

pub mod decode;
pub mod health;
pub mod listen;
pub mod push;

pub use decode::*;
pub use health::*;
pub use listen::*;
pub use push::*;

/// 路径中的记录 ID
#[derive(serde::Deserialize)]
pub struct IdPath {
    pub id: i64,
}
