//! # 解析能力模块
//!
//! 把原始载荷转换为结构化消息：
//! - **Nothing**：透传，始终返回空映射
//! - **BuiltinDecoder**：固定协议集合（DL/T 645、Modbus RTU、Modbus TCP），按枚举分派
//! - **ScriptDecoder**：用户脚本中的 `decode(bytes)` 函数
//!
//! [`DecoderCatalog`] 负责列出可选解析器（静态目录 + 动态注册的自定义脚本）。

mod builtin;
mod catalog;
mod error;
mod script;

pub use builtin::BuiltinDecoder;
pub use catalog::DecoderCatalog;
pub use error::DecodeError;
pub use script::{DECODE_FN, ScriptDecoder};

use async_trait::async_trait;
use domain::DecodedMessage;

/// 解析器契约。
#[async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, payload: &[u8]) -> Result<DecodedMessage, DecodeError>;
}

/// 透传解析器。
#[derive(Debug, Clone, Copy, Default)]
pub struct Nothing;

#[async_trait]
impl Decoder for Nothing {
    async fn decode(&self, _payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
        Ok(DecodedMessage::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_returns_empty_map() {
        assert!(Nothing.decode(b"anything").await.expect("decode").is_empty());
        assert!(Nothing.decode(&[]).await.expect("decode").is_empty());
    }
}
