use crate::{DecodeError, Decoder};
use async_trait::async_trait;
use domain::DecodedMessage;
use gateway_script::{Program, ScriptReturn, ScriptValue};
use serde_json::Value;

/// 脚本入口函数名。
pub const DECODE_FN: &str = "decode";

/// 基于用户脚本的解析器，调用脚本中的 `decode(bytes)`。
#[derive(Debug, Clone)]
pub struct ScriptDecoder {
    program: Program,
}

impl ScriptDecoder {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

#[async_trait]
impl Decoder for ScriptDecoder {
    async fn decode(&self, payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let result = self
            .program
            .call(DECODE_FN, vec![ScriptValue::from(payload)])
            .await?;
        match result {
            ScriptReturn::Undefined => Ok(DecodedMessage::new()),
            ScriptReturn::Json(Value::Object(map)) => Ok(map),
            other => Err(DecodeError::Shape(format!("{:?}", other))),
        }
    }
}
