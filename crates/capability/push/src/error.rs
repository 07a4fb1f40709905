/// 推送错误。
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("connect error: {0}")]
    Connect(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("write timed out after {0} ms")]
    Timeout(u128),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("config error: {0}")]
    Config(String),
}
