//! 嵌入式脚本解释器。
//!
//! 全进程共享一个 V8 isolate，运行在独立线程上；所有编译与调用通过任务通道串行执行。
//! 每个脚本程序拥有独立的 context，彼此的全局变量互不可见。

mod engine;
mod error;
mod host;
mod library;
mod value;

pub use error::ScriptError;
pub use host::{Program, ScriptHost, ScriptSettings};
pub use value::{ScriptReturn, ScriptValue};
