use gateway_script::ScriptError;

/// 解析错误。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// 帧结构不完整或标志字节不符
    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// 脚本返回值不是对象
    #[error("unexpected script result: {0}")]
    Shape(String),

    #[error("unknown decoder: {0}")]
    UnknownDecoder(String),
}
