//! # 配置存储
//!
//! 监听、脚本、推送三类配置记录的异步存储接口（[`traits`]）与内存实现
//! （[`in_memory`]），以及启动引导文件（[`bootstrap`]）。
//!
//! 存储只保存配置，运行实例由监管层根据配置创建。

pub mod bootstrap;
pub mod error;
pub mod in_memory;
pub mod traits;

pub use bootstrap::Bootstrap;
pub use error::StorageError;
pub use in_memory::*;
pub use traits::*;
