/// 脚本执行错误。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("compile error in {name}: {message}")]
    Compile { name: String, message: String },
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("script call exceeded {0} ms")]
    Timeout(u128),
    #[error("script exceeded heap limit of {0} MB")]
    HeapLimit(usize),
    #[error("function not defined: {0}")]
    MissingFunction(String),
    #[error("unknown program: {0}")]
    UnknownProgram(u64),
    #[error("script host unavailable: {0}")]
    Unavailable(String),
}
