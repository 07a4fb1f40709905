use crate::split::SplitError;
use gateway_script::ScriptError;

/// 监听错误。
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("bind {address} failed: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// 服务器运行期间的错误
    #[error("server error: {0}")]
    Server(String),

    /// 上游（如 MQTT broker）连接失败
    #[error("connect error: {0}")]
    Connect(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("split config error: {0}")]
    Split(#[from] SplitError),
}
