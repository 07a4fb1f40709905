use gateway_ingest::ListenError;
use gateway_push::PushError;
use gateway_script::ScriptError;

/// 监管层错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("listener error: {0}")]
    Listen(#[from] ListenError),

    #[error("push error: {0}")]
    Push(#[from] PushError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("unknown decoder: {0}")]
    UnknownDecoder(String),

    #[error("unknown script: {0}")]
    UnknownScript(i64),

    #[error("invalid: {0}")]
    Invalid(String),
}
